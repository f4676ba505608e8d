//! Emotion classification
//!
//! A fixed-priority chain of heuristic predicates over session state. The
//! first match wins; no match means the session is unremarkable, which is
//! the common case.

pub mod emotion;
pub mod rules;

pub use emotion::{Emotion, EmotionalEvent};
pub use rules::{classify, classify_gated, Classification};
