//! Tail-latency circuit breaker
//!
//! Two states only: CLOSED → OPEN on a single queue-to-process latency above
//! the ceiling, OPEN → CLOSED automatically once the cool-down window passes.
//! While open, the dispatch engine clears its lanes and rejects admission
//! with a retry hint; this breaker only tracks the state transitions.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Breaker state as seen by admission and the metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    /// Healthy, items flow.
    Closed,
    /// Tripped. Lanes cleared, admission rejected until cool-down expires.
    Open,
}

/// Latency-ceiling breaker with wall-clock auto-reset.
#[derive(Debug, Clone)]
pub struct LatencyBreaker {
    /// Per-item latency above this trips the breaker.
    latency_ceiling: Duration,
    /// How long the breaker stays open after a trip.
    cooldown: Duration,
    opened_at: Option<Instant>,
    trips: u64,
}

impl LatencyBreaker {
    pub fn new(latency_ceiling: Duration, cooldown: Duration) -> Self {
        Self {
            latency_ceiling,
            cooldown,
            opened_at: None,
            trips: 0,
        }
    }

    /// Feed one observed latency. Returns true when this observation trips
    /// the breaker (closed → open edge only).
    pub fn observe(&mut self, latency: Duration) -> bool {
        if self.state() == BreakerState::Open {
            return false;
        }
        if latency > self.latency_ceiling {
            self.opened_at = Some(Instant::now());
            self.trips += 1;
            return true;
        }
        // A healthy observation after an expired cool-down finalizes the
        // reset so `opened_at` does not linger.
        self.opened_at = None;
        false
    }

    /// Current state, computed lazily from the trip timestamp.
    pub fn state(&self) -> BreakerState {
        match self.opened_at {
            Some(opened) if opened.elapsed() < self.cooldown => BreakerState::Open,
            _ => BreakerState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == BreakerState::Open
    }

    /// Milliseconds until the breaker closes again; 0 when already closed.
    pub fn retry_after_ms(&self) -> u64 {
        match self.opened_at {
            Some(opened) => {
                let elapsed = opened.elapsed();
                if elapsed >= self.cooldown {
                    0
                } else {
                    (self.cooldown - elapsed).as_millis() as u64
                }
            }
            None => 0,
        }
    }

    /// Trips recorded since construction.
    pub fn trip_count(&self) -> u64 {
        self.trips
    }

    pub fn latency_ceiling(&self) -> Duration {
        self.latency_ceiling
    }
}

impl Default for LatencyBreaker {
    fn default() -> Self {
        Self::new(Duration::from_millis(5000), Duration::from_secs(30))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_breaker_starts_closed() {
        let breaker = LatencyBreaker::default();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.retry_after_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_breach_trips_immediately() {
        let mut breaker = LatencyBreaker::default();
        assert!(!breaker.observe(Duration::from_millis(4999)));
        assert_eq!(breaker.state(), BreakerState::Closed);

        assert!(breaker.observe(Duration::from_millis(5001)));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.trip_count(), 1);
        assert!(breaker.retry_after_ms() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ceiling_is_exclusive() {
        let mut breaker = LatencyBreaker::default();
        // Exactly at the ceiling does not trip.
        assert!(!breaker.observe(Duration::from_millis(5000)));
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_reset_after_cooldown() {
        let mut breaker = LatencyBreaker::default();
        breaker.observe(Duration::from_secs(6));
        assert!(breaker.is_open());

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(breaker.is_open());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.retry_after_ms(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_double_trip_while_open() {
        let mut breaker = LatencyBreaker::default();
        assert!(breaker.observe(Duration::from_secs(6)));
        assert!(!breaker.observe(Duration::from_secs(9)));
        assert_eq!(breaker.trip_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrips_after_reset() {
        let mut breaker = LatencyBreaker::default();
        breaker.observe(Duration::from_secs(6));
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(breaker.state(), BreakerState::Closed);

        assert!(breaker.observe(Duration::from_secs(7)));
        assert_eq!(breaker.trip_count(), 2);
        assert!(breaker.is_open());
    }
}
