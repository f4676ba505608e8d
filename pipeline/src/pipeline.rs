//! End-to-end pipeline wiring.
//!
//! One `Pipeline` owns the whole path from raw telemetry to delivered
//! output: session store, classifier gate, intervention matcher, dispatch
//! engine, and the channel multiplexer. The gateway binary talks to this
//! type and nothing below it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::channels::{ChannelMultiplexer, InboundMessage};
use crate::classify::{classify_gated, Emotion, EmotionalEvent};
use crate::config::PipelineConfig;
use crate::dispatch::{Admission, DispatchEngine, HttpValueResolver, PriorityLane, ValueResolver};
use crate::error::PipelineResult;
use crate::escalation::{ContactDirectory, EscalationEngine};
use crate::intervention::{InterventionMatcher, InterventionRules, InterventionType};
use crate::metrics::{MetricsSnapshot, PipelineCounters};
use crate::session::SessionStore;
use crate::telemetry::TelemetryBatch;

const MATCHER_PRUNE_INTERVAL: Duration = Duration::from_secs(300);

/// Acknowledgement for one accepted batch, including what the pipeline made
/// of it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAck {
    pub batch_id: Uuid,
    pub session_id: String,
    pub applied: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<Emotion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<InterventionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<PriorityLane>,
}

/// Producer-visible result of a batch submission.
#[derive(Debug, Clone)]
pub enum BatchOutcome {
    Accepted(BatchAck),
    /// Breaker open; the producer should retry after the hint.
    Rejected { retry_after_ms: u64 },
}

/// Reply to one inbound client frame.
#[derive(Debug, Clone)]
pub enum MessageReply {
    Pong,
    Batch(BatchOutcome),
    Noted,
}

pub struct Pipeline {
    store: Arc<SessionStore>,
    matcher: Arc<InterventionMatcher>,
    engine: Arc<DispatchEngine>,
    multiplexer: Arc<ChannelMultiplexer>,
    counters: Arc<PipelineCounters>,
}

impl Pipeline {
    /// Production wiring: HTTP value resolver and HTTP escalation channels.
    pub fn new(config: PipelineConfig, directory: ContactDirectory) -> PipelineResult<Self> {
        let resolver: Arc<dyn ValueResolver> =
            Arc::new(HttpValueResolver::new(&config.value_service)?);
        Self::with_resolver(config, directory, resolver)
    }

    /// Production wiring with a caller-supplied value resolver.
    pub fn with_resolver(
        config: PipelineConfig,
        directory: ContactDirectory,
        resolver: Arc<dyn ValueResolver>,
    ) -> PipelineResult<Self> {
        let counters = Arc::new(PipelineCounters::new());
        let multiplexer = Arc::new(ChannelMultiplexer::new(config.channels.clone()));
        let escalation = Arc::new(EscalationEngine::with_http_channels(
            directory,
            config.escalation.clone(),
            Arc::clone(&counters),
        )?);
        let engine = Arc::new(DispatchEngine::new(
            resolver,
            Arc::clone(&multiplexer),
            Some(escalation),
            Arc::clone(&counters),
            config.dispatch.clone(),
        ));
        let store = Arc::new(SessionStore::new(config.session.clone()));
        let matcher = Arc::new(InterventionMatcher::new(InterventionRules::default()));
        Ok(Self {
            store,
            matcher,
            engine,
            multiplexer,
            counters,
        })
    }

    /// Assembly from prebuilt parts; the seam tests use to swap providers.
    pub fn with_parts(
        store: Arc<SessionStore>,
        matcher: Arc<InterventionMatcher>,
        engine: Arc<DispatchEngine>,
        multiplexer: Arc<ChannelMultiplexer>,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            store,
            matcher,
            engine,
            multiplexer,
            counters,
        }
    }

    /// Run one telemetry batch through the whole pipeline.
    pub async fn handle_batch(&self, batch: TelemetryBatch) -> BatchOutcome {
        if let Some(retry_after_ms) = self.engine.retry_hint().await {
            PipelineCounters::incr(&self.counters.dispatch_rejected);
            return BatchOutcome::Rejected { retry_after_ms };
        }

        PipelineCounters::incr(&self.counters.batches_received);
        let outcome = self.store.ingest(&batch).await;
        PipelineCounters::add(&self.counters.events_applied, outcome.applied as u64);
        PipelineCounters::add(&self.counters.events_skipped, outcome.skipped as u64);

        let now = Utc::now();
        let mut ack = BatchAck {
            batch_id: Uuid::new_v4(),
            session_id: outcome.state.session_id.clone(),
            applied: outcome.applied,
            skipped: outcome.skipped,
            emotion: None,
            confidence: None,
            intervention: None,
            lane: None,
        };

        let Some(classification) = classify_gated(&outcome.state, now, self.matcher.rules())
        else {
            return BatchOutcome::Accepted(ack);
        };
        PipelineCounters::incr(&self.counters.classifications);

        let event = EmotionalEvent::from_state(
            &outcome.state,
            classification.emotion,
            classification.confidence,
            now,
        );
        let intervention = self
            .matcher
            .match_intervention(
                classification.emotion,
                classification.confidence,
                &event.session_id,
            )
            .await;
        if intervention.is_some() {
            PipelineCounters::incr(&self.counters.interventions_matched);
        }
        info!(
            session_id = %event.session_id,
            emotion = %classification.emotion,
            confidence = classification.confidence,
            intervention = intervention.map(|i| i.as_str()),
            "session classified"
        );

        ack.emotion = Some(classification.emotion);
        ack.confidence = Some(classification.confidence);
        ack.intervention = intervention;
        match self.engine.admit(event, intervention).await {
            Admission::Queued { lane } => {
                ack.lane = Some(lane);
            }
            Admission::Rejected { .. } => {
                // Breaker opened after the entry check; the batch is already
                // consumed, only the classified event is shed.
                debug!(session_id = %ack.session_id, "classified event shed at admission");
            }
        }
        BatchOutcome::Accepted(ack)
    }

    /// Handle one frame posted by a connected client.
    pub async fn handle_message(&self, session_id: &str, message: InboundMessage) -> MessageReply {
        self.multiplexer.mark_session_seen(session_id).await;
        match message {
            InboundMessage::Ping => MessageReply::Pong,
            InboundMessage::Telemetry { mut batch } => {
                // The connection is bound to a session; the path wins over
                // whatever the payload claims.
                batch.session_id = session_id.to_string();
                MessageReply::Batch(self.handle_batch(batch).await)
            }
            InboundMessage::InterventionShown { intervention_type } => {
                PipelineCounters::incr(&self.counters.interventions_shown);
                debug!(session_id, intervention = %intervention_type, "intervention shown");
                MessageReply::Noted
            }
            InboundMessage::InterventionClicked { intervention_type } => {
                PipelineCounters::incr(&self.counters.interventions_clicked);
                info!(session_id, intervention = %intervention_type, "intervention clicked");
                MessageReply::Noted
            }
        }
    }

    pub async fn metrics_snapshot(&self) -> MetricsSnapshot {
        let dispatch = self.engine.snapshot().await;
        MetricsSnapshot {
            generated_at: Utc::now(),
            active_sessions: self.store.active_sessions().await,
            queue_depths: dispatch.depths,
            latency: dispatch.latency,
            breaker: dispatch.breaker,
            breaker_trips: dispatch.breaker_trips,
            connections: self.multiplexer.connection_counts().await,
            totals: self.counters.totals(),
        }
    }

    /// Start every periodic task: session eviction, lane processing,
    /// connection liveness, and cooldown pruning.
    pub fn spawn_background(&self, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = vec![
            self.store.spawn_sweeper(cancel.clone()),
            self.multiplexer.spawn_liveness_sweep(cancel.clone()),
        ];
        handles.extend(self.engine.spawn_lanes(cancel.clone()));

        let matcher = Arc::clone(&self.matcher);
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(MATCHER_PRUNE_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        matcher.prune_expired().await;
                    }
                }
            }
        }));
        handles
    }

    pub fn multiplexer(&self) -> Arc<ChannelMultiplexer> {
        Arc::clone(&self.multiplexer)
    }

    pub fn counters(&self) -> Arc<PipelineCounters> {
        Arc::clone(&self.counters)
    }

    pub fn store(&self) -> Arc<SessionStore> {
        Arc::clone(&self.store)
    }
}
