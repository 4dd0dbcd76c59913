// MIDI module
// Output ports and the sound trigger used for step playback and previews

pub mod device;
pub mod output;

pub use device::{MidiDeviceInfo, MidiDeviceManager};
pub use output::{BASS_CHANNEL, MidiSoundTrigger, SilentTrigger, SoundTrigger};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    #[error("MIDI connection failed: {0}")]
    Connect(String),
}

pub type MidiResult<T> = Result<T, MidiError>;
