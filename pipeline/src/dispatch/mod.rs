//! Priority dispatch: value-ranked lanes, latency tracking, the circuit
//! breaker, and the engine that ties them to delivery.

pub mod breaker;
pub mod engine;
pub mod lane;
pub mod latency;
pub mod value;

pub use breaker::{BreakerState, LatencyBreaker};
pub use engine::{Admission, DispatchEngine, DispatchSnapshot, QueueDepths};
pub use lane::{DispatchItem, LaneQueue, PriorityLane};
pub use latency::{LatencyPercentiles, LatencyTracker};
pub use value::{HttpValueResolver, SessionValue, StaticValueResolver, ValueResolver, ValueTier};
