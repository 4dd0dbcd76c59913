// Sequencer module
// Grid state, patterns, column transitions and the shared step clock

pub mod clock;
pub mod drums;
pub mod grid;
pub mod pattern;
pub mod transition;
pub mod transport;

pub use clock::{ClockTick, StepClock, TickConsumer, TickProducer};
pub use grid::{Grid, GridEvent, GridEventKind};
pub use pattern::{Pattern, WirePattern};
pub use transition::{PatternTransition, TransitionHooks, TransitionStatus};
pub use transport::{
    Clock, ControllerId, SharedTransport, TransportController, TransportEvent, TransportManager,
    TransportState,
};

use thiserror::Error;

/// Number of steps in one loop
pub const STEPS: usize = 16;

/// Voice identifier: a MIDI drum pitch
pub type Voice = u8;

/// Sequencer-related errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    #[error("Invalid coordinate: voice {voice}, step {step}")]
    InvalidCoordinate { voice: Voice, step: usize },

    #[error("Unknown drum: {0}")]
    UnknownDrum(String),

    #[error("Unknown bass note: {0}")]
    UnknownNote(String),

    #[error("Invalid preset: {0}")]
    InvalidPreset(String),
}

pub type SequencerResult<T> = Result<T, SequencerError>;
