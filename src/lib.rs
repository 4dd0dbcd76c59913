// MMI Drums - Library exports for the binary, tests and benchmarks

pub mod bass;
pub mod bridge;
pub mod config;
pub mod connection;
pub mod generation;
pub mod messaging;
pub mod midi;
pub mod sequencer;
pub mod session;

// Re-export commonly used types for convenience
pub use bass::BassSequencer;
pub use bridge::{BridgeClient, BridgeEvent, MemoryChannel, PlayMode, UdpChannel};
pub use config::SessionConfig;
pub use generation::{
    Continuation, ContinuationNote, GenerationMode, GenerationSettings, GeneratorError,
    Orchestrator, PatternGenerator,
};
pub use messaging::channels::{
    create_command_channel, create_notification_channel, create_tick_channel,
};
pub use sequencer::{Grid, Pattern, STEPS, TransportController, TransportManager, Voice};
pub use session::{PlaybackSession, SessionError};
