//! Priority dispatch engine.
//!
//! Classified events are admitted into value-ranked lanes and processed by
//! per-lane ticker tasks. Each item is timed from admission to delivery; a
//! single item over the latency ceiling trips the breaker, which sheds every
//! queued item and rejects new admissions until the cool-down passes.
//! Bounded queues plus drop-oldest overflow keep memory flat under load.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::breaker::{BreakerState, LatencyBreaker};
use super::lane::{DispatchItem, LaneQueue, PriorityLane};
use super::latency::{LatencyPercentiles, LatencyTracker};
use super::value::{SessionValue, ValueResolver};
use crate::channels::ChannelMultiplexer;
use crate::classify::EmotionalEvent;
use crate::config::DispatchConfig;
use crate::escalation::{CriticalAlert, EscalationEngine};
use crate::intervention::InterventionType;
use crate::metrics::PipelineCounters;

/// Per-lane queue depths for the metrics snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDepths {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub standard: usize,
}

/// Dispatch-side slice of the metrics snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub depths: QueueDepths,
    pub latency: LatencyPercentiles,
    pub breaker: BreakerState,
    pub breaker_trips: u64,
}

/// Admission verdict returned to the caller feeding the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued { lane: PriorityLane },
    Rejected { retry_after_ms: u64 },
}

/// Everything the lane tasks mutate, under one lock. Held only for queue
/// surgery and sample bookkeeping, never across delivery awaits.
struct EngineState {
    lanes: HashMap<PriorityLane, LaneQueue>,
    breaker: LatencyBreaker,
    latency: LatencyTracker,
}

pub struct DispatchEngine {
    state: Mutex<EngineState>,
    resolver: Arc<dyn ValueResolver>,
    multiplexer: Arc<ChannelMultiplexer>,
    escalation: Option<Arc<EscalationEngine>>,
    counters: Arc<PipelineCounters>,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(
        resolver: Arc<dyn ValueResolver>,
        multiplexer: Arc<ChannelMultiplexer>,
        escalation: Option<Arc<EscalationEngine>>,
        counters: Arc<PipelineCounters>,
        config: DispatchConfig,
    ) -> Self {
        let lanes = PriorityLane::all()
            .iter()
            .map(|lane| (*lane, LaneQueue::new(lane.capacity())))
            .collect();
        let state = EngineState {
            lanes,
            breaker: LatencyBreaker::new(config.latency_ceiling(), config.breaker_cooldown()),
            latency: LatencyTracker::new(config.latency_sample_capacity),
        };
        Self {
            state: Mutex::new(state),
            resolver,
            multiplexer,
            escalation,
            counters,
            config,
        }
    }

    /// Retry hint for upstream producers while the breaker is open.
    pub async fn retry_hint(&self) -> Option<u64> {
        let state = self.state.lock().await;
        if state.breaker.state() == BreakerState::Open {
            Some(state.breaker.retry_after_ms())
        } else {
            None
        }
    }

    /// Resolve session value, degrading to zero on any failure.
    async fn resolve_value(&self, session_id: &str) -> SessionValue {
        match self.resolver.resolve(session_id).await {
            Ok(value) => value,
            Err(err) => {
                debug!(session_id, error = %err, "value resolution failed, treating as zero");
                SessionValue::zero()
            }
        }
    }

    /// Admit one classified event into its value lane.
    pub async fn admit(
        &self,
        event: EmotionalEvent,
        intervention: Option<InterventionType>,
    ) -> Admission {
        let value = self.resolve_value(&event.session_id).await;
        let lane = PriorityLane::for_value(value.value_usd);

        let mut state = self.state.lock().await;
        if state.breaker.state() == BreakerState::Open {
            PipelineCounters::incr(&self.counters.dispatch_rejected);
            return Admission::Rejected {
                retry_after_ms: state.breaker.retry_after_ms(),
            };
        }
        let item = DispatchItem {
            event,
            intervention,
            value_usd: value.value_usd,
            lane,
            enqueued_at: Instant::now(),
        };
        if let Some(queue) = state.lanes.get_mut(&lane) {
            if let Some(evicted) = queue.push(item) {
                PipelineCounters::incr(&self.counters.dispatch_dropped);
                debug!(
                    lane = %lane,
                    session_id = %evicted.event.session_id,
                    "lane full, oldest item dropped"
                );
            }
        }
        PipelineCounters::incr(&self.counters.dispatch_admitted);
        Admission::Queued { lane }
    }

    /// One lane tick: drain a batch and deliver it, watching the clock.
    pub async fn process_lane(&self, lane: PriorityLane) {
        let batch = {
            let mut state = self.state.lock().await;
            if state.breaker.state() == BreakerState::Open {
                return;
            }
            match state.lanes.get_mut(&lane) {
                Some(queue) if !queue.is_empty() => queue.drain(lane.batch_size()),
                _ => return,
            }
        };

        let mut processed = 0u64;
        let mut items = batch.into_iter();
        while let Some(item) = items.next() {
            self.deliver(&item).await;
            processed += 1;

            let waited = item.enqueued_at.elapsed();
            let mut state = self.state.lock().await;
            state.latency.record(waited.as_millis() as f64);
            if state.breaker.observe(waited) {
                let mut shed = items.len();
                for each in PriorityLane::all() {
                    if let Some(queue) = state.lanes.get_mut(each) {
                        shed += queue.clear();
                    }
                }
                PipelineCounters::add(&self.counters.dispatch_dropped, shed as u64);
                warn!(
                    lane = %lane,
                    latency_ms = waited.as_millis() as u64,
                    ceiling_ms = self.config.latency_ceiling_ms,
                    shed,
                    "latency ceiling breached, breaker open and all lanes cleared"
                );
                break;
            }
            let percentiles = state.latency.percentiles();
            if percentiles.p99_ms > self.config.p99_target_ms as f64 {
                warn!(
                    p99_ms = percentiles.p99_ms,
                    target_ms = self.config.p99_target_ms,
                    "p99 dispatch latency above target"
                );
            }
        }
        PipelineCounters::add(&self.counters.dispatch_processed, processed);
    }

    /// Push one item out: emotion to every dashboard, intervention to its
    /// session, escalation raced in the background when warranted.
    async fn deliver(&self, item: &DispatchItem) {
        self.multiplexer.broadcast_emotion(&item.event).await;

        if let Some(intervention_type) = item.intervention {
            let delivered = self
                .multiplexer
                .send_intervention(&item.event.session_id, intervention_type)
                .await;
            if delivered {
                PipelineCounters::incr(&self.counters.interventions_delivered);
            } else {
                PipelineCounters::incr(&self.counters.interventions_skipped);
                debug!(
                    session_id = %item.event.session_id,
                    intervention = %intervention_type,
                    "no live client connection, intervention skipped"
                );
            }
        }

        if let Some(escalation) = &self.escalation {
            if escalation.eligible(item.event.emotion, item.value_usd) {
                let alert = CriticalAlert::from_event(&item.event, item.value_usd);
                let engine = Arc::clone(escalation);
                tokio::spawn(async move {
                    engine.escalate(alert).await;
                });
            }
        }
    }

    /// One ticker task per lane; all stop when the token cancels.
    pub fn spawn_lanes(self: &Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        PriorityLane::all()
            .iter()
            .map(|lane| {
                let engine = Arc::clone(self);
                let cancel = cancel.clone();
                let lane = *lane;
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(lane.cadence());
                    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = interval.tick() => {
                                engine.process_lane(lane).await;
                            }
                        }
                    }
                })
            })
            .collect()
    }

    pub async fn snapshot(&self) -> DispatchSnapshot {
        let state = self.state.lock().await;
        let depth = |lane: PriorityLane| state.lanes.get(&lane).map(|q| q.len()).unwrap_or(0);
        let depths = QueueDepths {
            critical: depth(PriorityLane::Critical),
            high: depth(PriorityLane::High),
            medium: depth(PriorityLane::Medium),
            standard: depth(PriorityLane::Standard),
        };
        DispatchSnapshot {
            depths,
            latency: state.latency.percentiles(),
            breaker: state.breaker.state(),
            breaker_trips: state.breaker.trip_count(),
        }
    }
}
