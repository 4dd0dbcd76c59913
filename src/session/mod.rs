// Session module
// Playback session: clock ticks, loop counters, generation cycles and bridge feedback

pub mod controller;
pub mod idle;
pub mod schedule;

pub use controller::PlaybackSession;
pub use idle::IdleTimer;
pub use schedule::PlaySchedule;

use crate::bridge::BridgeError;
use crate::config::ConfigError;
use crate::generation::GenerationError;
use crate::sequencer::SequencerError;
use thiserror::Error;

/// Session-related errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Generator not initialized")]
    NotInitialized,

    #[error("A generation is already in flight")]
    GenerationInFlight,

    #[error("Sequencer error: {0}")]
    Sequencer(#[from] SequencerError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

pub type SessionResult<T> = Result<T, SessionError>;
