//! Outbound delivery: wire protocol, connection registries, and the
//! multiplexer that routes pipeline output to connected clients.

pub mod multiplexer;
pub mod protocol;
pub mod registry;

pub use multiplexer::{ChannelMultiplexer, ConnectionCounts};
pub use protocol::{InboundMessage, OutboundMessage};
pub use registry::{ClientRegistry, SendOutcome};
