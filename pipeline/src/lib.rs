//! Behavioral telemetry pipeline
//!
//! Turns raw browser telemetry into live emotion classifications, on-page
//! interventions, and executive escalations:
//! - session aggregation with bounded accumulators and idle eviction
//! - ordered heuristic emotion classification with per-rule confidence
//! - cooldown-gated intervention matching
//! - value-ranked priority dispatch behind a latency circuit breaker
//! - connection multiplexing to dashboards and visitor sessions
//! - deadline-raced executive escalation for critical high-value sessions
//!
//! The `pulse-gateway` binary wires this library to HTTP; everything here is
//! transport-agnostic.

#![allow(clippy::uninlined_format_args)]

pub mod channels;
pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod escalation;
pub mod intervention;
pub mod metrics;
pub mod pipeline;
pub mod session;
pub mod telemetry;

// Re-export the types the gateway and tests reach for most.
pub use channels::{ChannelMultiplexer, InboundMessage, OutboundMessage};
pub use classify::{classify, classify_gated, Classification, Emotion, EmotionalEvent};
pub use config::PipelineConfig;
pub use dispatch::{Admission, DispatchEngine, PriorityLane, ValueResolver};
pub use error::{PipelineError, PipelineResult};
pub use escalation::{ContactDirectory, CriticalAlert, DeliveryResult, EscalationEngine};
pub use intervention::{InterventionMatcher, InterventionRules, InterventionType};
pub use metrics::{format_summary, MetricsSnapshot, PipelineCounters};
pub use pipeline::{BatchAck, BatchOutcome, MessageReply, Pipeline};
pub use session::{SessionState, SessionStore};
pub use telemetry::{RawEvent, TelemetryBatch};
