//! Telemetry wire types
//!
//! Batches arrive from the browser SDK as JSON with camelCase identifiers
//! and a tagged event union. Individual events are parsed leniently: an
//! unrecognized or malformed event is skipped, never an error, so one bad
//! entry cannot poison a batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One submitted batch of raw browser events for a single session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryBatch {
    pub session_id: String,
    pub tenant_id: String,
    /// Raw event values; parsed individually so malformed entries drop out.
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl TelemetryBatch {
    pub fn new(session_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            tenant_id: tenant_id.into(),
            events: Vec::new(),
            received_at: Utc::now(),
        }
    }

    /// Attach an already-typed event. Used by tests and the bundled-client
    /// message path; the HTTP path carries raw JSON values.
    pub fn with_event(mut self, event: &RawEvent) -> Self {
        if let Ok(value) = serde_json::to_value(event) {
            self.events.push(value);
        }
        self
    }

    /// Parse the raw values into typed events, skipping malformed entries.
    ///
    /// Returns the parsed events and the number skipped.
    pub fn parse_events(&self) -> (Vec<RawEvent>, usize) {
        let mut parsed = Vec::with_capacity(self.events.len());
        let mut skipped = 0;
        for value in &self.events {
            match serde_json::from_value::<RawEvent>(value.clone()) {
                Ok(event) => parsed.push(event),
                Err(_) => skipped += 1,
            }
        }
        (parsed, skipped)
    }
}

fn default_click_count() -> u32 {
    1
}

/// A single browser interaction event.
///
/// The discriminant rides in a `type` field; payload fields keep the SDK's
/// camelCase spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RawEvent {
    Mousemove {
        #[serde(default)]
        velocity: f64,
        #[serde(default)]
        acceleration: f64,
        #[serde(default)]
        jerk: f64,
    },
    #[serde(rename_all = "camelCase")]
    RageClick {
        #[serde(default = "default_click_count")]
        click_count: u32,
        #[serde(default)]
        interval_ms: u64,
    },
    ViewportExit {
        #[serde(default)]
        velocity: f64,
        /// Which viewport edge the pointer left through ("top", "left", ...).
        #[serde(default)]
        edge: String,
    },
    #[serde(rename_all = "camelCase")]
    TextSelection {
        #[serde(default)]
        element: String,
        #[serde(default)]
        duration_ms: u64,
    },
    Scroll {
        #[serde(default)]
        percentage: f64,
        #[serde(default)]
        direction: String,
        #[serde(default)]
        speed: f64,
    },
    VisibilityChange {
        #[serde(default)]
        hidden: bool,
    },
    PageView {
        url: String,
    },
}

impl RawEvent {
    /// Wire discriminant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::Mousemove { .. } => "mousemove",
            RawEvent::RageClick { .. } => "rage_click",
            RawEvent::ViewportExit { .. } => "viewport_exit",
            RawEvent::TextSelection { .. } => "text_selection",
            RawEvent::Scroll { .. } => "scroll",
            RawEvent::VisibilityChange { .. } => "visibility_change",
            RawEvent::PageView { .. } => "page_view",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_deserializes_camel_case() {
        let batch: TelemetryBatch = serde_json::from_value(json!({
            "sessionId": "s-1",
            "tenantId": "t-1",
            "events": [
                {"type": "rage_click", "clickCount": 3, "intervalMs": 180},
                {"type": "page_view", "url": "/pricing"}
            ]
        }))
        .unwrap();
        assert_eq!(batch.session_id, "s-1");
        assert_eq!(batch.tenant_id, "t-1");
        assert_eq!(batch.events.len(), 2);
    }

    #[test]
    fn test_malformed_events_are_skipped_not_fatal() {
        let batch: TelemetryBatch = serde_json::from_value(json!({
            "sessionId": "s-2",
            "tenantId": "t-1",
            "events": [
                {"type": "mousemove", "velocity": 120.0},
                {"type": "warp_drive", "speed": 9000},
                {"no_type_at_all": true},
                {"type": "page_view", "url": "/cart"}
            ]
        }))
        .unwrap();
        let (events, skipped) = batch.parse_events();
        assert_eq!(events.len(), 2);
        assert_eq!(skipped, 2);
        assert_eq!(events[0].kind(), "mousemove");
        assert_eq!(events[1].kind(), "page_view");
    }

    #[test]
    fn test_zero_parseable_events_is_empty_not_error() {
        let batch: TelemetryBatch = serde_json::from_value(json!({
            "sessionId": "s-3",
            "tenantId": "t-1",
            "events": [{"type": "nonsense"}]
        }))
        .unwrap();
        let (events, skipped) = batch.parse_events();
        assert!(events.is_empty());
        assert_eq!(skipped, 1);
    }

    #[test]
    fn test_missing_payload_fields_default() {
        let event: RawEvent =
            serde_json::from_value(json!({"type": "rage_click"})).unwrap();
        assert_eq!(
            event,
            RawEvent::RageClick {
                click_count: 1,
                interval_ms: 0
            }
        );
    }

    #[test]
    fn test_event_round_trips_through_with_event() {
        let raw = RawEvent::ViewportExit {
            velocity: 640.0,
            edge: "top".into(),
        };
        let batch = TelemetryBatch::new("s-4", "t-1").with_event(&raw);
        let (events, skipped) = batch.parse_events();
        assert_eq!(skipped, 0);
        assert_eq!(events, vec![raw]);
    }
}
