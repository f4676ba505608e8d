//! Wire messages exchanged with dashboards and visitor browsers.
//!
//! Outbound frames go over the streaming connections; inbound frames arrive
//! on the per-session message endpoint. Both sides tag frames so clients can
//! switch on `type` without sniffing payload shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::EmotionalEvent;
use crate::intervention::InterventionType;
use crate::telemetry::TelemetryBatch;

/// Server to client frames. The discriminant rides in `type` with the
/// payload fields beside it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Handshake ack sent as the first frame on every stream.
    #[serde(rename_all = "camelCase")]
    Connected {
        channel: String,
        timestamp: DateTime<Utc>,
    },
    /// Classified emotion, broadcast to every dashboard.
    Event { payload: EmotionalEvent },
    /// Intervention command for one visitor session.
    #[serde(rename_all = "camelCase")]
    Intervention {
        intervention_type: InterventionType,
        session_id: String,
        timestamp: DateTime<Utc>,
    },
    /// Liveness reply.
    #[serde(rename_all = "camelCase")]
    Pong { timestamp: DateTime<Utc> },
}

impl OutboundMessage {
    pub fn connected(channel: &str) -> Self {
        Self::Connected {
            channel: channel.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn intervention(intervention_type: InterventionType, session_id: &str) -> Self {
        Self::Intervention {
            intervention_type,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        Self::Pong {
            timestamp: Utc::now(),
        }
    }

    /// Serialize to a JSON string for stream transmission.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Client to server frames, posted to the session message endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Liveness probe; answered with a pong and refreshes the session clock.
    Ping,
    /// Telemetry submitted over the message channel instead of the
    /// ingest endpoint. Same batch shape, same processing.
    Telemetry { batch: TelemetryBatch },
    /// The visitor saw a rendered intervention.
    #[serde(rename_all = "camelCase")]
    InterventionShown {
        intervention_type: InterventionType,
    },
    /// The visitor clicked through an intervention.
    #[serde(rename_all = "camelCase")]
    InterventionClicked {
        intervention_type: InterventionType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Emotion;
    use crate::session::EmotionalVectors;

    #[test]
    fn test_emotion_frame_nests_under_payload() {
        let payload = EmotionalEvent {
            session_id: "s-1".into(),
            tenant_id: "t-1".into(),
            emotion: Emotion::Rage,
            confidence: 91,
            vectors: EmotionalVectors::default(),
            page_url: "/checkout".into(),
            session_age_secs: 42,
            timestamp: Utc::now(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&OutboundMessage::Event { payload }.to_json()).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["payload"]["emotion"], "rage");
        assert_eq!(json["payload"]["sessionId"], "s-1");
    }

    #[test]
    fn test_intervention_frame_is_flat_camel_case() {
        let frame = OutboundMessage::intervention(InterventionType::DiscountModal, "s-9");
        let json: serde_json::Value = serde_json::from_str(&frame.to_json()).unwrap();
        assert_eq!(json["type"], "intervention");
        assert_eq!(json["interventionType"], "discount_modal");
        assert_eq!(json["sessionId"], "s-9");
    }

    #[test]
    fn test_inbound_ping_and_feedback_parse() {
        let ping: InboundMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(ping, InboundMessage::Ping));

        let shown: InboundMessage = serde_json::from_str(
            r#"{"type":"intervention_shown","interventionType":"help_chat"}"#,
        )
        .unwrap();
        match shown {
            InboundMessage::InterventionShown { intervention_type } => {
                assert_eq!(intervention_type, InterventionType::HelpChat);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn test_inbound_unknown_type_rejected() {
        let parsed = serde_json::from_str::<InboundMessage>(r#"{"type":"emotion"}"#);
        assert!(parsed.is_err());
    }
}
