//! Intervention vocabulary and the static emotion → intervention table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::classify::Emotion;

/// On-page actions the browser SDK knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    DiscountModal,
    TrustBadges,
    UrgencyBanner,
    SocialToast,
    ComparisonModal,
    HelpChat,
    ValueHighlight,
    ExitIntent,
}

impl InterventionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterventionType::DiscountModal => "discount_modal",
            InterventionType::TrustBadges => "trust_badges",
            InterventionType::UrgencyBanner => "urgency_banner",
            InterventionType::SocialToast => "social_toast",
            InterventionType::ComparisonModal => "comparison_modal",
            InterventionType::HelpChat => "help_chat",
            InterventionType::ValueHighlight => "value_highlight",
            InterventionType::ExitIntent => "exit_intent",
        }
    }
}

impl std::fmt::Display for InterventionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the table: what to show, when it is confident enough, and how
/// long before the same intervention may fire again for a session.
#[derive(Debug, Clone, Copy)]
pub struct InterventionRule {
    pub intervention: InterventionType,
    pub min_confidence: u8,
    pub cooldown: Duration,
}

impl InterventionRule {
    pub fn new(intervention: InterventionType, min_confidence: u8, cooldown_ms: u64) -> Self {
        Self {
            intervention,
            min_confidence,
            cooldown: Duration::from_millis(cooldown_ms),
        }
    }
}

/// Emotion-keyed rule table. Lookup is by emotion only; tenant-specific
/// overlays are applied upstream of the pipeline.
#[derive(Debug, Clone)]
pub struct InterventionRules {
    rules: HashMap<Emotion, InterventionRule>,
}

impl Default for InterventionRules {
    fn default() -> Self {
        use Emotion::*;
        use InterventionType::*;
        let table = [
            (Rage, InterventionRule::new(HelpChat, 75, 120_000)),
            (ExitRisk, InterventionRule::new(ExitIntent, 70, 90_000)),
            (CartHesitation, InterventionRule::new(DiscountModal, 65, 300_000)),
            (CartReview, InterventionRule::new(ValueHighlight, 60, 300_000)),
            (StickerShock, InterventionRule::new(DiscountModal, 70, 300_000)),
            (PriceShock, InterventionRule::new(ValueHighlight, 70, 240_000)),
            (AbandonmentIntent, InterventionRule::new(UrgencyBanner, 65, 180_000)),
            (DecisionParalysis, InterventionRule::new(ComparisonModal, 60, 300_000)),
            (Confusion, InterventionRule::new(HelpChat, 55, 240_000)),
            (Skeptical, InterventionRule::new(TrustBadges, 60, 600_000)),
            (Evaluation, InterventionRule::new(ComparisonModal, 55, 300_000)),
            (Frustration, InterventionRule::new(HelpChat, 70, 180_000)),
            (Hesitation, InterventionRule::new(SocialToast, 50, 240_000)),
            (PurchaseIntent, InterventionRule::new(SocialToast, 60, 600_000)),
            (Delight, InterventionRule::new(SocialToast, 75, 900_000)),
        ];
        Self {
            rules: table.into_iter().collect(),
        }
    }
}

impl InterventionRules {
    /// An empty table; every lookup misses. For tests and kill switches.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Replace or add one emotion's rule.
    pub fn with_rule(mut self, emotion: Emotion, rule: InterventionRule) -> Self {
        self.rules.insert(emotion, rule);
        self
    }

    pub fn get(&self, emotion: Emotion) -> Option<&InterventionRule> {
        self.rules.get(&emotion)
    }

    pub fn min_confidence(&self, emotion: Emotion) -> Option<u8> {
        self.rules.get(&emotion).map(|rule| rule.min_confidence)
    }

    /// The longest cooldown in the table. Conservative bound for pruning
    /// fired-timestamp entries.
    pub fn longest_cooldown(&self) -> Option<Duration> {
        self.rules.values().map(|rule| rule.cooldown).max()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
