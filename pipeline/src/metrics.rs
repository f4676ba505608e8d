//! Pipeline metrics
//!
//! Lock-free counters incremented along the hot path, plus the periodic
//! snapshot the binary emits for the external observability collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::channels::ConnectionCounts;
use crate::dispatch::{BreakerState, LatencyPercentiles, QueueDepths};

/// Monotonic event counters. Relaxed ordering is fine; these feed dashboards,
/// not control flow.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub batches_received: AtomicU64,
    pub events_applied: AtomicU64,
    pub events_skipped: AtomicU64,
    pub classifications: AtomicU64,
    pub interventions_matched: AtomicU64,
    pub interventions_delivered: AtomicU64,
    pub interventions_skipped: AtomicU64,
    pub interventions_shown: AtomicU64,
    pub interventions_clicked: AtomicU64,
    pub dispatch_admitted: AtomicU64,
    pub dispatch_rejected: AtomicU64,
    pub dispatch_dropped: AtomicU64,
    pub dispatch_processed: AtomicU64,
    pub escalations_triggered: AtomicU64,
    pub escalations_delivered: AtomicU64,
    pub escalations_failed: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn totals(&self) -> CounterTotals {
        CounterTotals {
            batches_received: Self::read(&self.batches_received),
            events_applied: Self::read(&self.events_applied),
            events_skipped: Self::read(&self.events_skipped),
            classifications: Self::read(&self.classifications),
            interventions_matched: Self::read(&self.interventions_matched),
            interventions_delivered: Self::read(&self.interventions_delivered),
            interventions_skipped: Self::read(&self.interventions_skipped),
            interventions_shown: Self::read(&self.interventions_shown),
            interventions_clicked: Self::read(&self.interventions_clicked),
            dispatch_admitted: Self::read(&self.dispatch_admitted),
            dispatch_rejected: Self::read(&self.dispatch_rejected),
            dispatch_dropped: Self::read(&self.dispatch_dropped),
            dispatch_processed: Self::read(&self.dispatch_processed),
            escalations_triggered: Self::read(&self.escalations_triggered),
            escalations_delivered: Self::read(&self.escalations_delivered),
            escalations_failed: Self::read(&self.escalations_failed),
        }
    }
}

/// Plain-number copy of the counters for serialization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CounterTotals {
    pub batches_received: u64,
    pub events_applied: u64,
    pub events_skipped: u64,
    pub classifications: u64,
    pub interventions_matched: u64,
    pub interventions_delivered: u64,
    pub interventions_skipped: u64,
    pub interventions_shown: u64,
    pub interventions_clicked: u64,
    pub dispatch_admitted: u64,
    pub dispatch_rejected: u64,
    pub dispatch_dropped: u64,
    pub dispatch_processed: u64,
    pub escalations_triggered: u64,
    pub escalations_delivered: u64,
    pub escalations_failed: u64,
}

/// One periodic structured snapshot of the whole pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub active_sessions: usize,
    pub queue_depths: QueueDepths,
    pub latency: LatencyPercentiles,
    pub breaker: BreakerState,
    pub breaker_trips: u64,
    pub connections: ConnectionCounts,
    pub totals: CounterTotals,
}

/// Human-readable one-screen rendering of a snapshot.
pub fn format_summary(snapshot: &MetricsSnapshot) -> String {
    let mut lines = Vec::new();

    lines.push("=== Pipeline Snapshot ===".to_string());
    lines.push(format!("Generated: {}", snapshot.generated_at));
    lines.push(String::new());

    lines.push("-- Sessions --".to_string());
    lines.push(format!(
        "  Active: {}  Batches: {}  Events: {} (+{} skipped)",
        snapshot.active_sessions,
        snapshot.totals.batches_received,
        snapshot.totals.events_applied,
        snapshot.totals.events_skipped,
    ));
    lines.push(String::new());

    lines.push("-- Dispatch --".to_string());
    lines.push(format!(
        "  Queues: critical {}  high {}  medium {}  standard {}",
        snapshot.queue_depths.critical,
        snapshot.queue_depths.high,
        snapshot.queue_depths.medium,
        snapshot.queue_depths.standard,
    ));
    lines.push(format!(
        "  Latency: p50 {:.0}ms  p95 {:.0}ms  p99 {:.0}ms",
        snapshot.latency.p50_ms, snapshot.latency.p95_ms, snapshot.latency.p99_ms,
    ));
    lines.push(format!(
        "  Breaker: {:?} (trips: {})  Admitted: {}  Rejected: {}  Dropped: {}",
        snapshot.breaker,
        snapshot.breaker_trips,
        snapshot.totals.dispatch_admitted,
        snapshot.totals.dispatch_rejected,
        snapshot.totals.dispatch_dropped,
    ));
    lines.push(String::new());

    lines.push("-- Delivery --".to_string());
    lines.push(format!(
        "  Connections: dashboards {}  interventions {}  telemetry {}",
        snapshot.connections.dashboards,
        snapshot.connections.interventions,
        snapshot.connections.telemetry,
    ));
    lines.push(format!(
        "  Interventions: matched {}  delivered {}  skipped {}  shown {}  clicked {}",
        snapshot.totals.interventions_matched,
        snapshot.totals.interventions_delivered,
        snapshot.totals.interventions_skipped,
        snapshot.totals.interventions_shown,
        snapshot.totals.interventions_clicked,
    ));
    lines.push(format!(
        "  Escalations: triggered {}  delivered {}  failed {}",
        snapshot.totals.escalations_triggered,
        snapshot.totals.escalations_delivered,
        snapshot.totals.escalations_failed,
    ));

    lines.join("\n")
}
