// Bridge module
// OSC wire protocol to the external real-time player

pub mod channel;
pub mod client;
pub mod protocol;

pub use channel::{BridgeChannel, ChannelEvent, MemoryChannel, MemoryHandle, UdpChannel};
pub use client::{BridgeClient, BridgeEvent, BridgeEventKind};
pub use protocol::{PatternType, PlayMode};

use thiserror::Error;

/// Bridge-related errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge not connected")]
    NotConnected,

    #[error("Bridge I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OSC error: {0:?}")]
    Osc(rosc::OscError),
}

pub type BridgeResult<T> = Result<T, BridgeError>;
