//! Executive escalation: tiered contact lookup, multi-channel delivery
//! providers, and the race-to-deliver engine.

pub mod contacts;
pub mod delivery;
pub mod engine;

pub use contacts::{ContactDirectory, ContactTier, ExecutiveRole};
pub use delivery::{ChannelKind, ChatChannel, DeliveryChannel, OperatorChannel, SmsChannel};
pub use engine::{CriticalAlert, DeliveryResult, EscalationEngine};
