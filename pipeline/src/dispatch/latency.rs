//! Rolling queue-to-process latency tracking
//!
//! A bounded sample buffer; p50/p95/p99 are recomputed after every sample so
//! the breaker and the metrics snapshot always see current numbers.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Current percentile readings, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

/// Bounded rolling latency buffer.
#[derive(Debug)]
pub struct LatencyTracker {
    samples: VecDeque<f64>,
    capacity: usize,
    current: LatencyPercentiles,
}

impl LatencyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            current: LatencyPercentiles::default(),
        }
    }

    /// Record one sample and recompute the percentiles.
    pub fn record(&mut self, latency_ms: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(latency_ms);
        self.recompute();
    }

    pub fn percentiles(&self) -> LatencyPercentiles {
        self.current
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn recompute(&mut self) {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.current = LatencyPercentiles {
            p50_ms: nearest_rank(&sorted, 50.0),
            p95_ms: nearest_rank(&sorted, 95.0),
            p99_ms: nearest_rank(&sorted, 99.0),
        };
    }
}

/// Nearest-rank percentile over an ascending-sorted slice.
fn nearest_rank(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tracker_reads_zero() {
        let tracker = LatencyTracker::new(100);
        assert_eq!(tracker.percentiles(), LatencyPercentiles::default());
    }

    #[test]
    fn test_percentiles_over_uniform_samples() {
        let mut tracker = LatencyTracker::new(1000);
        for ms in 1..=100 {
            tracker.record(ms as f64);
        }
        let p = tracker.percentiles();
        assert_eq!(p.p50_ms, 50.0);
        assert_eq!(p.p95_ms, 95.0);
        assert_eq!(p.p99_ms, 99.0);
    }

    #[test]
    fn test_single_sample_is_every_percentile() {
        let mut tracker = LatencyTracker::new(10);
        tracker.record(42.0);
        let p = tracker.percentiles();
        assert_eq!(p.p50_ms, 42.0);
        assert_eq!(p.p99_ms, 42.0);
    }

    #[test]
    fn test_buffer_is_bounded_and_rolls() {
        let mut tracker = LatencyTracker::new(5);
        for ms in [1.0, 1.0, 1.0, 1.0, 1.0, 900.0, 900.0, 900.0, 900.0, 900.0] {
            tracker.record(ms);
        }
        assert_eq!(tracker.sample_count(), 5);
        // Only the last five samples remain.
        assert_eq!(tracker.percentiles().p50_ms, 900.0);
    }

    #[test]
    fn test_p99_tracks_tail_outlier() {
        let mut tracker = LatencyTracker::new(200);
        for _ in 0..98 {
            tracker.record(10.0);
        }
        tracker.record(5000.0);
        // 99 samples: the nearest-rank p99 lands on the outlier.
        let p = tracker.percentiles();
        assert_eq!(p.p50_ms, 10.0);
        assert_eq!(p.p99_ms, 5000.0);
    }
}
