//! Per-session behavioral state
//!
//! `SessionState` is the mutable aggregate behind one visitor session: mouse
//! pattern windows, interaction counters, and the five bounded emotional
//! vectors. All sample windows are fixed-capacity FIFO; all vectors clamp to
//! [0,100] on every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fixed-capacity FIFO window over numeric samples. Oldest evicted first.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SampleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a sample, evicting the oldest when full.
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
}

/// One recorded viewport exit: which edge and how fast.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitVector {
    pub edge: String,
    pub velocity: f64,
}

/// Mouse movement accumulators for one session.
#[derive(Debug, Clone)]
pub struct MousePatterns {
    pub velocity: SampleWindow,
    pub acceleration: SampleWindow,
    pub jerk: SampleWindow,
    pub rage_clicks: u32,
    pub exit_vectors: VecDeque<ExitVector>,
    exit_capacity: usize,
    pub micro_movements: u32,
}

impl MousePatterns {
    pub fn new(sample_capacity: usize, exit_capacity: usize) -> Self {
        Self {
            velocity: SampleWindow::new(sample_capacity),
            acceleration: SampleWindow::new(sample_capacity),
            jerk: SampleWindow::new(sample_capacity),
            rage_clicks: 0,
            exit_vectors: VecDeque::with_capacity(exit_capacity),
            exit_capacity: exit_capacity.max(1),
            micro_movements: 0,
        }
    }

    /// Record a viewport exit, evicting the oldest when full.
    pub fn record_exit(&mut self, edge: String, velocity: f64) {
        if self.exit_vectors.len() == self.exit_capacity {
            self.exit_vectors.pop_front();
        }
        self.exit_vectors.push_back(ExitVector { edge, velocity });
    }

    pub fn last_exit(&self) -> Option<&ExitVector> {
        self.exit_vectors.back()
    }
}

/// Interaction counters consulted by the classifier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Interactions {
    pub price_views: u32,
    pub cart_views: u32,
    pub comparisons: u32,
    pub tab_switches: u32,
    pub text_selections: u32,
}

/// Five accumulated behavioral signals, each bounded to [0,100].
///
/// Every adder clamps, so a reading outside the range is unrepresentable no
/// matter what sequence of deltas arrives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EmotionalVectors {
    pub frustration: f64,
    pub anxiety: f64,
    pub urgency: f64,
    pub excitement: f64,
    pub trust: f64,
}

impl Default for EmotionalVectors {
    fn default() -> Self {
        Self {
            frustration: 0.0,
            anxiety: 0.0,
            urgency: 0.0,
            excitement: 0.0,
            // Visitors start neutral-positive on trust.
            trust: 50.0,
        }
    }
}

impl EmotionalVectors {
    pub fn add_frustration(&mut self, delta: f64) {
        self.frustration = (self.frustration + delta).clamp(0.0, 100.0);
    }

    pub fn add_anxiety(&mut self, delta: f64) {
        self.anxiety = (self.anxiety + delta).clamp(0.0, 100.0);
    }

    pub fn add_urgency(&mut self, delta: f64) {
        self.urgency = (self.urgency + delta).clamp(0.0, 100.0);
    }

    pub fn add_excitement(&mut self, delta: f64) {
        self.excitement = (self.excitement + delta).clamp(0.0, 100.0);
    }

    pub fn add_trust(&mut self, delta: f64) {
        self.trust = (self.trust + delta).clamp(0.0, 100.0);
    }

    /// Re-clamp every field. Invariant repair after direct field writes.
    pub fn clamp_all(&mut self) {
        self.frustration = self.frustration.clamp(0.0, 100.0);
        self.anxiety = self.anxiety.clamp(0.0, 100.0);
        self.urgency = self.urgency.clamp(0.0, 100.0);
        self.excitement = self.excitement.clamp(0.0, 100.0);
        self.trust = self.trust.clamp(0.0, 100.0);
    }

    /// True when every field sits inside [0,100].
    pub fn in_bounds(&self) -> bool {
        [
            self.frustration,
            self.anxiety,
            self.urgency,
            self.excitement,
            self.trust,
        ]
        .iter()
        .all(|v| (0.0..=100.0).contains(v))
    }
}

/// The mutable aggregate for one visitor session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: String,
    pub tenant_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub page_url: String,
    pub mouse: MousePatterns,
    pub interactions: Interactions,
    pub vectors: EmotionalVectors,
}

impl SessionState {
    pub fn new(
        session_id: impl Into<String>,
        tenant_id: impl Into<String>,
        sample_capacity: usize,
        exit_capacity: usize,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            tenant_id: tenant_id.into(),
            start_time: now,
            last_activity: now,
            page_url: String::new(),
            mouse: MousePatterns::new(sample_capacity, exit_capacity),
            interactions: Interactions::default(),
            vectors: EmotionalVectors::default(),
        }
    }

    /// Seconds since the session started, as seen at `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.start_time).num_seconds().max(0)
    }

    /// Seconds since the last applied batch, as seen at `now`.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_activity).num_seconds().max(0)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}
