//! HTTP surface: telemetry ingest, event streams, session messages, metrics.
//!
//! Downstream delivery rides Server-Sent Events; clients talk back through
//! the per-session message endpoint. Stream teardown is handled lazily: a
//! dropped stream closes its queue, and the registries prune the connection
//! on the next send or liveness sweep.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use pipeline::{
    format_summary, BatchAck, BatchOutcome, InboundMessage, MessageReply, MetricsSnapshot,
    OutboundMessage, Pipeline, TelemetryBatch,
};

pub type AppState = Arc<Pipeline>;

pub fn build_router(pipeline: AppState) -> Router {
    // Telemetry arrives from arbitrary customer origins, so CORS stays open.
    Router::new()
        .route("/health", get(health))
        .route("/v1/telemetry", post(ingest_telemetry))
        .route("/v1/stream/emotions", get(stream_emotions))
        .route("/v1/stream/session/{session_id}", get(stream_session))
        .route("/v1/stream/client/{session_id}", get(stream_client))
        .route("/v1/session/{session_id}/message", post(session_message))
        .route("/v1/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}

#[derive(Debug, Serialize)]
struct IngestAccepted {
    accepted: bool,
    #[serde(flatten)]
    ack: BatchAck,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "pulse-gateway" }))
}

/// POST /v1/telemetry. Accepted batches return their ack; an open breaker
/// returns 503 with a retry hint.
async fn ingest_telemetry(
    State(pipeline): State<AppState>,
    Json(batch): Json<TelemetryBatch>,
) -> Response {
    match pipeline.handle_batch(batch).await {
        BatchOutcome::Accepted(ack) => {
            Json(IngestAccepted {
                accepted: true,
                ack,
            })
            .into_response()
        }
        BatchOutcome::Rejected { retry_after_ms } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "accepted": false, "retryAfterMs": retry_after_ms })),
        )
            .into_response(),
    }
}

/// GET /v1/stream/emotions. Dashboard firehose of every classified emotion.
async fn stream_emotions(
    State(pipeline): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let mux = pipeline.multiplexer();
    let (tx, rx) = mux.client_queue();
    let (key, id) = mux.register_dashboard(tx).await;
    info!(key, client_id = %id, "dashboard stream opened");
    sse_stream(rx, "emotions")
}

/// GET /v1/stream/session/{session_id}. Dedicated intervention stream for
/// one visitor session.
async fn stream_session(
    State(pipeline): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let mux = pipeline.multiplexer();
    let (tx, rx) = mux.client_queue();
    let id = mux.register_intervention(&session_id, tx).await;
    info!(session_id, client_id = %id, "intervention stream opened");
    sse_stream(rx, "interventions")
}

/// GET /v1/stream/client/{session_id}. Bundled stream: interventions down,
/// telemetry and feedback up through the message endpoint.
async fn stream_client(
    State(pipeline): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let mux = pipeline.multiplexer();
    let (tx, rx) = mux.client_queue();
    let id = mux.register_telemetry(&session_id, tx).await;
    info!(session_id, client_id = %id, "client stream opened");
    sse_stream(rx, "telemetry")
}

fn sse_stream(
    mut rx: mpsc::Receiver<OutboundMessage>,
    channel: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    use async_stream::stream;
    let stream = stream! {
        yield Ok(frame(&OutboundMessage::connected(channel)));
        while let Some(message) = rx.recv().await {
            yield Ok(frame(&message));
        }
    };
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

fn frame(message: &OutboundMessage) -> Event {
    Event::default().data(message.to_json())
}

/// POST /v1/session/{session_id}/message. Upstream frames from a connected
/// client: pings, bundled telemetry, intervention feedback.
async fn session_message(
    State(pipeline): State<AppState>,
    Path(session_id): Path<String>,
    Json(message): Json<InboundMessage>,
) -> Response {
    match pipeline.handle_message(&session_id, message).await {
        MessageReply::Pong => Json(OutboundMessage::pong()).into_response(),
        MessageReply::Batch(BatchOutcome::Accepted(ack)) => {
            Json(IngestAccepted {
                accepted: true,
                ack,
            })
            .into_response()
        }
        MessageReply::Batch(BatchOutcome::Rejected { retry_after_ms }) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "accepted": false, "retryAfterMs": retry_after_ms })),
        )
            .into_response(),
        MessageReply::Noted => Json(json!({ "ok": true })).into_response(),
    }
}

async fn metrics(State(pipeline): State<AppState>) -> Json<MetricsSnapshot> {
    Json(pipeline.metrics_snapshot().await)
}

/// Periodic human-readable snapshot in the gateway log.
pub fn spawn_metrics_logger(
    pipeline: AppState,
    interval_secs: u64,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    let snapshot = pipeline.metrics_snapshot().await;
                    info!("\n{}", format_summary(&snapshot));
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::config::{ChannelConfig, DispatchConfig, SessionConfig};
    use pipeline::dispatch::StaticValueResolver;
    use pipeline::intervention::InterventionMatcher;
    use pipeline::session::SessionStore;
    use pipeline::{
        ChannelMultiplexer, DispatchEngine, InterventionRules, PipelineCounters, RawEvent,
    };

    fn test_pipeline() -> AppState {
        let counters = Arc::new(PipelineCounters::new());
        let multiplexer = Arc::new(ChannelMultiplexer::new(ChannelConfig::default()));
        let engine = Arc::new(DispatchEngine::new(
            Arc::new(StaticValueResolver { value: 0.0 }),
            Arc::clone(&multiplexer),
            None,
            Arc::clone(&counters),
            DispatchConfig::default(),
        ));
        Arc::new(Pipeline::with_parts(
            Arc::new(SessionStore::new(SessionConfig::default())),
            Arc::new(InterventionMatcher::new(InterventionRules::default())),
            engine,
            multiplexer,
            counters,
        ))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ingest_returns_ack() {
        let pipeline = test_pipeline();
        let batch = TelemetryBatch::new("s-1", "t-1").with_event(&RawEvent::PageView {
            url: "/pricing".into(),
        });

        let response = ingest_telemetry(State(pipeline), Json(batch)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["accepted"], true);
        assert_eq!(body["sessionId"], "s-1");
        assert_eq!(body["applied"], 1);
        assert!(body["batchId"].is_string());
    }

    #[tokio::test]
    async fn test_ping_message_answers_pong() {
        let pipeline = test_pipeline();
        let response = session_message(
            State(pipeline),
            Path("s-1".to_string()),
            Json(InboundMessage::Ping),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["type"], "pong");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_shape() {
        let pipeline = test_pipeline();
        let Json(snapshot) = metrics(State(pipeline)).await;
        assert_eq!(snapshot.active_sessions, 0);
        assert_eq!(snapshot.totals.batches_received, 0);
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body["status"], "ok");
    }
}
