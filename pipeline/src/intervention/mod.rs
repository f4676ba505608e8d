//! Intervention matching
//!
//! The static emotion → intervention table and the cooldown-enforcing
//! matcher that sits between classification and dispatch.

pub mod matcher;
pub mod rules;

pub use matcher::InterventionMatcher;
pub use rules::{InterventionRule, InterventionRules, InterventionType};
