//! Ordered emotion heuristics
//!
//! The chain is evaluated top to bottom and the first matching rule wins, so
//! ordering encodes severity. Every predicate is a pure function of the
//! session's counters, vectors, age, and page URL; every scorer is float
//! arithmetic with a final round, capped at 100.
//!
//! Threshold comparisons are deliberately uneven (`>` here, `>=` there);
//! they mirror the tuned production behavior per rule and must not be
//! normalized in a cleanup pass.

use chrono::{DateTime, Utc};

use crate::intervention::InterventionRules;
use crate::session::SessionState;

use super::emotion::Emotion;

/// A matched emotion with its rounded confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub emotion: Emotion,
    pub confidence: u8,
}

struct EmotionRule {
    emotion: Emotion,
    matches: fn(&SessionState, i64) -> bool,
    score: fn(&SessionState, i64) -> f64,
}

fn on_page(state: &SessionState, fragment: &str) -> bool {
    state.page_url.contains(fragment)
}

fn capped(count: u32, cap: u32) -> f64 {
    f64::from(count.min(cap))
}

// ── Predicates and scorers, severity order ──────────────────────────────

fn rage_matches(state: &SessionState, _age: i64) -> bool {
    state.mouse.rage_clicks >= 3 && state.vectors.frustration > 80.0
}

fn rage_score(state: &SessionState, _age: i64) -> f64 {
    60.0 + capped(state.mouse.rage_clicks, 8) * 5.0 + state.vectors.frustration * 0.15
}

fn exit_risk_matches(state: &SessionState, _age: i64) -> bool {
    let fast_exit = state
        .mouse
        .last_exit()
        .map(|exit| exit.velocity > 500.0)
        .unwrap_or(false);
    fast_exit && state.vectors.urgency >= 60.0
}

fn exit_risk_score(state: &SessionState, _age: i64) -> f64 {
    50.0 + state.vectors.urgency * 0.4 + capped(state.mouse.exit_vectors.len() as u32, 5) * 4.0
}

fn cart_hesitation_matches(state: &SessionState, age: i64) -> bool {
    on_page(state, "/cart")
        && age > 90
        && (state.mouse.micro_movements >= 10 || state.vectors.anxiety > 50.0)
}

fn cart_hesitation_score(state: &SessionState, _age: i64) -> f64 {
    40.0 + state.vectors.anxiety * 0.35 + capped(state.mouse.micro_movements, 30)
}

fn cart_review_matches(state: &SessionState, _age: i64) -> bool {
    on_page(state, "/cart")
        && state.interactions.cart_views >= 2
        && state.vectors.frustration < 30.0
        && state.vectors.anxiety < 40.0
}

fn cart_review_score(state: &SessionState, _age: i64) -> f64 {
    45.0 + capped(state.interactions.cart_views, 5) * 8.0 + state.vectors.trust * 0.2
}

fn sticker_shock_matches(state: &SessionState, _age: i64) -> bool {
    on_page(state, "/pricing")
        && state.interactions.price_views >= 2
        && state.vectors.anxiety >= 60.0
}

fn sticker_shock_score(state: &SessionState, _age: i64) -> f64 {
    40.0 + state.vectors.anxiety * 0.5 + capped(state.interactions.price_views, 6) * 5.0
}

fn price_shock_matches(state: &SessionState, _age: i64) -> bool {
    state.interactions.price_views >= 2 && state.vectors.anxiety > 75.0
}

fn price_shock_score(state: &SessionState, _age: i64) -> f64 {
    35.0 + state.vectors.anxiety * 0.6 + capped(state.interactions.price_views, 6) * 3.0
}

fn abandonment_matches(state: &SessionState, _age: i64) -> bool {
    state.vectors.urgency > 70.0
        && state.mouse.last_exit().is_some()
        && (state.interactions.cart_views >= 1 || state.interactions.price_views >= 1)
}

fn abandonment_score(state: &SessionState, _age: i64) -> f64 {
    45.0 + state.vectors.urgency * 0.4 + capped(state.mouse.exit_vectors.len() as u32, 5) * 3.0
}

fn paralysis_matches(state: &SessionState, age: i64) -> bool {
    age > 300 && state.interactions.comparisons >= 3 && state.mouse.micro_movements > 20
}

fn paralysis_score(state: &SessionState, _age: i64) -> f64 {
    40.0 + capped(state.interactions.comparisons, 8) * 6.0
        + capped(state.mouse.micro_movements, 40) * 0.5
}

fn confusion_matches(state: &SessionState, _age: i64) -> bool {
    state.mouse.micro_movements >= 15 && state.vectors.frustration > 40.0
}

fn confusion_score(state: &SessionState, _age: i64) -> f64 {
    30.0 + capped(state.mouse.micro_movements, 40) + state.vectors.frustration * 0.3
}

fn skeptical_matches(state: &SessionState, _age: i64) -> bool {
    state.vectors.trust < 30.0 && state.interactions.text_selections >= 2
}

fn skeptical_score(state: &SessionState, _age: i64) -> f64 {
    40.0 + (30.0 - state.vectors.trust) * 1.5 + capped(state.interactions.text_selections, 6) * 5.0
}

fn evaluation_matches(state: &SessionState, _age: i64) -> bool {
    state.interactions.comparisons >= 2 && state.vectors.anxiety < 50.0
}

fn evaluation_score(state: &SessionState, _age: i64) -> f64 {
    40.0 + capped(state.interactions.comparisons, 6) * 8.0 + state.vectors.trust * 0.3
}

fn frustration_matches(state: &SessionState, _age: i64) -> bool {
    state.vectors.frustration >= 60.0
}

fn frustration_score(state: &SessionState, _age: i64) -> f64 {
    30.0 + state.vectors.frustration * 0.6
}

fn hesitation_matches(state: &SessionState, age: i64) -> bool {
    age > 120 && state.mouse.micro_movements >= 8 && state.vectors.urgency < 40.0
}

fn hesitation_score(state: &SessionState, age: i64) -> f64 {
    35.0 + capped(state.mouse.micro_movements, 30) * 1.5 + (age as f64 / 60.0) * 2.0
}

fn purchase_intent_matches(state: &SessionState, _age: i64) -> bool {
    state.interactions.cart_views >= 1
        && state.vectors.excitement > 60.0
        && state.vectors.frustration < 30.0
}

fn purchase_intent_score(state: &SessionState, _age: i64) -> f64 {
    40.0 + state.vectors.excitement * 0.5 + capped(state.interactions.cart_views, 5) * 5.0
}

fn delight_matches(state: &SessionState, _age: i64) -> bool {
    state.vectors.excitement >= 75.0 && state.vectors.trust >= 60.0
}

fn delight_score(state: &SessionState, _age: i64) -> f64 {
    30.0 + state.vectors.excitement * 0.4 + state.vectors.trust * 0.3
}

const RULES: &[EmotionRule] = &[
    EmotionRule {
        emotion: Emotion::Rage,
        matches: rage_matches,
        score: rage_score,
    },
    EmotionRule {
        emotion: Emotion::ExitRisk,
        matches: exit_risk_matches,
        score: exit_risk_score,
    },
    EmotionRule {
        emotion: Emotion::CartHesitation,
        matches: cart_hesitation_matches,
        score: cart_hesitation_score,
    },
    EmotionRule {
        emotion: Emotion::CartReview,
        matches: cart_review_matches,
        score: cart_review_score,
    },
    EmotionRule {
        emotion: Emotion::StickerShock,
        matches: sticker_shock_matches,
        score: sticker_shock_score,
    },
    EmotionRule {
        emotion: Emotion::PriceShock,
        matches: price_shock_matches,
        score: price_shock_score,
    },
    EmotionRule {
        emotion: Emotion::AbandonmentIntent,
        matches: abandonment_matches,
        score: abandonment_score,
    },
    EmotionRule {
        emotion: Emotion::DecisionParalysis,
        matches: paralysis_matches,
        score: paralysis_score,
    },
    EmotionRule {
        emotion: Emotion::Confusion,
        matches: confusion_matches,
        score: confusion_score,
    },
    EmotionRule {
        emotion: Emotion::Skeptical,
        matches: skeptical_matches,
        score: skeptical_score,
    },
    EmotionRule {
        emotion: Emotion::Evaluation,
        matches: evaluation_matches,
        score: evaluation_score,
    },
    EmotionRule {
        emotion: Emotion::Frustration,
        matches: frustration_matches,
        score: frustration_score,
    },
    EmotionRule {
        emotion: Emotion::Hesitation,
        matches: hesitation_matches,
        score: hesitation_score,
    },
    EmotionRule {
        emotion: Emotion::PurchaseIntent,
        matches: purchase_intent_matches,
        score: purchase_intent_score,
    },
    EmotionRule {
        emotion: Emotion::Delight,
        matches: delight_matches,
        score: delight_score,
    },
];

/// First matching rule. `None` is the common case for an unremarkable
/// session, not an error.
pub fn classify(state: &SessionState, now: DateTime<Utc>) -> Option<Classification> {
    let age = state.age_secs(now);
    for rule in RULES {
        if (rule.matches)(state, age) {
            let confidence = (rule.score)(state, age).round().clamp(0.0, 100.0) as u8;
            return Some(Classification {
                emotion: rule.emotion,
                confidence,
            });
        }
    }
    None
}

/// `classify`, then discard anything under the intervention table's
/// per-emotion minimum so sub-threshold noise never reaches dispatch.
pub fn classify_gated(
    state: &SessionState,
    now: DateTime<Utc>,
    rules: &InterventionRules,
) -> Option<Classification> {
    let classification = classify(state, now)?;
    let gate = rules.min_confidence(classification.emotion)?;
    if classification.confidence >= gate {
        Some(classification)
    } else {
        None
    }
}
