// Connection module
// Bridge connection state and caller-driven reconnection

pub mod reconnect;
pub mod status;

pub use reconnect::ReconnectionStrategy;
pub use status::{AtomicConnectionState, ConnectionState};
