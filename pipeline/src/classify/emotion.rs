//! Emotion vocabulary and the classified-event snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::{EmotionalVectors, SessionState};

/// Discrete emotion labels, in no particular order here; classification
/// priority lives in the rule chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Rage,
    ExitRisk,
    CartHesitation,
    CartReview,
    StickerShock,
    PriceShock,
    AbandonmentIntent,
    DecisionParalysis,
    Confusion,
    Skeptical,
    Evaluation,
    Frustration,
    Hesitation,
    PurchaseIntent,
    Delight,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Rage => "rage",
            Emotion::ExitRisk => "exit_risk",
            Emotion::CartHesitation => "cart_hesitation",
            Emotion::CartReview => "cart_review",
            Emotion::StickerShock => "sticker_shock",
            Emotion::PriceShock => "price_shock",
            Emotion::AbandonmentIntent => "abandonment_intent",
            Emotion::DecisionParalysis => "decision_paralysis",
            Emotion::Confusion => "confusion",
            Emotion::Skeptical => "skeptical",
            Emotion::Evaluation => "evaluation",
            Emotion::Frustration => "frustration",
            Emotion::Hesitation => "hesitation",
            Emotion::PurchaseIntent => "purchase_intent",
            Emotion::Delight => "delight",
        }
    }

    /// Emotions severe enough to page a human for a high-value session.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Emotion::Rage | Emotion::ExitRisk | Emotion::AbandonmentIntent | Emotion::PriceShock
        )
    }

    pub fn all() -> &'static [Emotion] {
        &[
            Emotion::Rage,
            Emotion::ExitRisk,
            Emotion::CartHesitation,
            Emotion::CartReview,
            Emotion::StickerShock,
            Emotion::PriceShock,
            Emotion::AbandonmentIntent,
            Emotion::DecisionParalysis,
            Emotion::Confusion,
            Emotion::Skeptical,
            Emotion::Evaluation,
            Emotion::Frustration,
            Emotion::Hesitation,
            Emotion::PurchaseIntent,
            Emotion::Delight,
        ]
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one qualifying classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalEvent {
    pub session_id: String,
    pub tenant_id: String,
    pub emotion: Emotion,
    /// In [0, 100], already gated against the rule table's minimum.
    pub confidence: u8,
    pub vectors: EmotionalVectors,
    pub page_url: String,
    pub session_age_secs: i64,
    pub timestamp: DateTime<Utc>,
}

impl EmotionalEvent {
    /// Snapshot `state` at `now` under the given label.
    pub fn from_state(
        state: &SessionState,
        emotion: Emotion,
        confidence: u8,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: state.session_id.clone(),
            tenant_id: state.tenant_id.clone(),
            emotion,
            confidence,
            vectors: state.vectors,
            page_url: state.page_url.clone(),
            session_age_secs: state.age_secs(now),
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_snake_case_labels() {
        let json = serde_json::to_string(&Emotion::StickerShock).unwrap();
        assert_eq!(json, "\"sticker_shock\"");
        let back: Emotion = serde_json::from_str("\"abandonment_intent\"").unwrap();
        assert_eq!(back, Emotion::AbandonmentIntent);
    }

    #[test]
    fn test_critical_set() {
        assert!(Emotion::Rage.is_critical());
        assert!(Emotion::ExitRisk.is_critical());
        assert!(Emotion::AbandonmentIntent.is_critical());
        assert!(Emotion::PriceShock.is_critical());
        assert!(!Emotion::Delight.is_critical());
        assert!(!Emotion::StickerShock.is_critical());
    }

    #[test]
    fn test_event_snapshot_is_camel_case() {
        let state = SessionState::new("s-1", "t-1", 10, 5);
        let event = EmotionalEvent::from_state(&state, Emotion::Rage, 90, Utc::now());
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("sessionId").is_some());
        assert!(value.get("sessionAgeSecs").is_some());
        assert_eq!(value["emotion"], "rage");
    }
}
