//! Priority lanes and their bounded queues
//!
//! Lane assignment is purely economic: resolved session value picks one of
//! four lanes. Each lane queue is bounded FIFO with drop-oldest overflow, so
//! admission never blocks and memory never grows past the lane capacity.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::classify::EmotionalEvent;
use crate::intervention::InterventionType;

/// Session value thresholds, in USD, for lane assignment.
pub const CRITICAL_VALUE: f64 = 100_000.0;
pub const HIGH_VALUE: f64 = 50_000.0;
pub const MEDIUM_VALUE: f64 = 10_000.0;

/// One queued unit of work: a classified event plus its matched intervention,
/// if any. The target connection is looked up by session id at delivery time,
/// never stored here.
#[derive(Debug, Clone)]
pub struct DispatchItem {
    pub event: EmotionalEvent,
    pub intervention: Option<InterventionType>,
    pub value_usd: f64,
    pub lane: PriorityLane,
    pub enqueued_at: Instant,
}

/// The four processing lanes, fastest cadence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityLane {
    Critical,
    High,
    Medium,
    Standard,
}

impl PriorityLane {
    /// Lane for a resolved session value.
    pub fn for_value(value_usd: f64) -> Self {
        if value_usd >= CRITICAL_VALUE {
            PriorityLane::Critical
        } else if value_usd >= HIGH_VALUE {
            PriorityLane::High
        } else if value_usd >= MEDIUM_VALUE {
            PriorityLane::Medium
        } else {
            PriorityLane::Standard
        }
    }

    /// Tick interval for this lane's processing task.
    pub fn cadence(&self) -> Duration {
        match self {
            PriorityLane::Critical => Duration::from_millis(100),
            PriorityLane::High => Duration::from_millis(250),
            PriorityLane::Medium => Duration::from_millis(500),
            PriorityLane::Standard => Duration::from_millis(1000),
        }
    }

    /// Items dequeued per tick.
    pub fn batch_size(&self) -> usize {
        match self {
            PriorityLane::Critical => 10,
            PriorityLane::High => 10,
            PriorityLane::Medium => 25,
            PriorityLane::Standard => 50,
        }
    }

    /// Queue capacity before drop-oldest kicks in.
    pub fn capacity(&self) -> usize {
        match self {
            PriorityLane::Critical => 500,
            PriorityLane::High => 1000,
            PriorityLane::Medium => 2000,
            PriorityLane::Standard => 5000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityLane::Critical => "critical",
            PriorityLane::High => "high",
            PriorityLane::Medium => "medium",
            PriorityLane::Standard => "standard",
        }
    }

    pub fn all() -> &'static [PriorityLane] {
        &[
            PriorityLane::Critical,
            PriorityLane::High,
            PriorityLane::Medium,
            PriorityLane::Standard,
        ]
    }
}

impl std::fmt::Display for PriorityLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded FIFO queue with drop-oldest overflow.
#[derive(Debug)]
pub struct LaneQueue {
    items: VecDeque<DispatchItem>,
    capacity: usize,
    dropped: u64,
}

impl LaneQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Enqueue, evicting and returning the oldest item when full.
    pub fn push(&mut self, item: DispatchItem) -> Option<DispatchItem> {
        let evicted = if self.items.len() == self.capacity {
            self.dropped += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Dequeue up to `max` items in FIFO order.
    pub fn drain(&mut self, max: usize) -> Vec<DispatchItem> {
        let take = max.min(self.items.len());
        self.items.drain(..take).collect()
    }

    /// Drop everything. Returns how many items were shed.
    pub fn clear(&mut self) -> usize {
        let shed = self.items.len();
        self.items.clear();
        shed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items dropped by overflow since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
