//! Cooldown-tracking intervention matcher
//!
//! On a successful match the last-fired timestamp updates immediately,
//! before anybody attempts delivery. A concurrent duplicate therefore loses
//! even if the winning delivery later fails: at-most-once per cooldown
//! window, independent of delivery outcome.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::classify::Emotion;

use super::rules::{InterventionRules, InterventionType};

type FiredKey = (String, InterventionType);

/// Matches classified emotions against the rule table, enforcing per-session
/// per-type cooldowns.
pub struct InterventionMatcher {
    rules: InterventionRules,
    fired: Mutex<HashMap<FiredKey, Instant>>,
}

impl InterventionMatcher {
    pub fn new(rules: InterventionRules) -> Self {
        Self {
            rules,
            fired: Mutex::new(HashMap::new()),
        }
    }

    pub fn rules(&self) -> &InterventionRules {
        &self.rules
    }

    /// Resolve (emotion, confidence, session) to an intervention, or `None`
    /// when the table misses, confidence is under the rule threshold, or the
    /// same type fired for this session within its cooldown.
    pub async fn match_intervention(
        &self,
        emotion: Emotion,
        confidence: u8,
        session_id: &str,
    ) -> Option<InterventionType> {
        let rule = self.rules.get(emotion)?;
        if confidence < rule.min_confidence {
            return None;
        }

        let key = (session_id.to_string(), rule.intervention);
        let now = Instant::now();
        let mut fired = self.fired.lock().await;
        if let Some(last) = fired.get(&key) {
            if now.duration_since(*last) < rule.cooldown {
                return None;
            }
        }
        fired.insert(key, now);
        Some(rule.intervention)
    }

    /// Drop cooldown entries whose window has fully elapsed. Keeps the map
    /// from growing with every session ever seen.
    pub async fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut fired = self.fired.lock().await;
        let before = fired.len();
        let max_cooldown = self
            .rules
            .longest_cooldown()
            .unwrap_or(std::time::Duration::ZERO);
        fired.retain(|_, last| now.duration_since(*last) < max_cooldown);
        before - fired.len()
    }

    /// Number of live cooldown entries.
    pub async fn tracked(&self) -> usize {
        self.fired.lock().await.len()
    }
}
