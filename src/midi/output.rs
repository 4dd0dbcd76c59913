// Sound trigger - Plays a voice when a step sounds or a cell is previewed

use super::device::MidiDeviceManager;
use super::{MidiError, MidiResult};
use crate::sequencer::Voice;
use midir::MidiOutputConnection;
use std::time::Instant;

/// GM percussion channel (10), zero-based
pub const DRUM_CHANNEL: u8 = 9;
/// Melodic channel used by the bass line
pub const BASS_CHANNEL: u8 = 0;
const NOTE_VELOCITY: u8 = 100;

/// Fire-and-forget sound capability
pub trait SoundTrigger: Send {
    fn play_voice(&mut self, voice: Voice, at: Instant);
}

/// Does nothing; used when no MIDI port is available
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentTrigger;

impl SoundTrigger for SilentTrigger {
    fn play_voice(&mut self, _voice: Voice, _at: Instant) {}
}

/// Note-on/note-off pair on a zero-based channel
pub fn note_hit(channel: u8, voice: Voice) -> [[u8; 3]; 2] {
    let channel = channel & 0x0F;
    let note = voice & 0x7F;
    [
        [0x90 | channel, note, NOTE_VELOCITY],
        [0x80 | channel, note, 0],
    ]
}

/// Note-on/note-off pair per voice on the GM drum channel
pub fn drum_hit(voice: Voice) -> [[u8; 3]; 2] {
    note_hit(DRUM_CHANNEL, voice)
}

/// Sound trigger sending notes through midir, drums on the GM drum channel
pub struct MidiSoundTrigger {
    connection: MidiOutputConnection,
    port_name: String,
    channel: u8,
}

impl MidiSoundTrigger {
    /// Connect to the named port, or the first available one
    pub fn connect(port: Option<&str>) -> MidiResult<Self> {
        Self::connect_on_channel(port, DRUM_CHANNEL)
    }

    /// Same as `connect`, playing on another zero-based channel
    pub fn connect_on_channel(port: Option<&str>, channel: u8) -> MidiResult<Self> {
        let channel = channel & 0x0F;
        let (midi_out, out_port) = MidiDeviceManager::new()
            .find_output_port(port)
            .ok_or_else(|| MidiError::PortNotFound(port.unwrap_or("<default>").to_string()))?;

        let port_name = midi_out
            .port_name(&out_port)
            .unwrap_or_else(|_| "unknown".to_string());
        let connection = midi_out
            .connect(&out_port, "mmi-drums-out")
            .map_err(|e| MidiError::Connect(e.to_string()))?;

        log::info!("MIDI output connected: {} (channel {})", port_name, channel + 1);
        Ok(Self {
            connection,
            port_name,
            channel,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl SoundTrigger for MidiSoundTrigger {
    fn play_voice(&mut self, voice: Voice, _at: Instant) {
        for message in note_hit(self.channel, voice) {
            if let Err(e) = self.connection.send(&message) {
                log::warn!("MIDI send failed: {}", e);
                return;
            }
        }
    }
}
