//! Session aggregation
//!
//! Raw telemetry batches fold into per-session behavioral state here:
//! bounded mouse-pattern windows, interaction counters, and the five
//! clamped emotional vectors. The store owns every live session and evicts
//! idle ones on a periodic sweep.

pub mod aggregator;
pub mod state;
pub mod store;

pub use aggregator::{apply_batch, apply_event};
pub use state::{EmotionalVectors, ExitVector, Interactions, MousePatterns, SampleWindow, SessionState};
pub use store::{IngestOutcome, SessionStore};
