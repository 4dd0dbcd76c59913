// Drums - General MIDI drum map and preset parsing

use crate::sequencer::{SequencerError, SequencerResult, Voice};

/// Canonical pitch for each drum name
pub const DRUM_MAP: [(&str, Voice); 9] = [
    ("kick", 36),
    ("snare", 38),
    ("hihatClosed", 42),
    ("hihatOpen", 46),
    ("tomLow", 45),
    ("tomMid", 48),
    ("tomHigh", 50),
    ("crash", 49),
    ("ride", 51),
];

/// Every pitch a generator may emit for a drum, canonical pitch first
const EXTENDED_DRUM_MAP: [(&str, &[Voice]); 9] = [
    ("kick", &[36, 35]),
    (
        "snare",
        &[38, 27, 28, 31, 32, 33, 34, 37, 39, 40, 56, 65, 66, 75, 85],
    ),
    ("hihatClosed", &[42, 44, 54, 68, 69, 70, 71, 73, 78, 80, 22]),
    ("hihatOpen", &[46, 67, 72, 74, 79, 81, 26]),
    ("tomLow", &[45, 29, 41, 43, 61, 64, 84]),
    ("tomMid", &[48, 47, 60, 63, 77, 86, 87]),
    ("tomHigh", &[50, 30, 62, 76, 83]),
    ("crash", &[49, 52, 55, 57, 58]),
    ("ride", &[51, 53, 59, 82]),
];

/// Names of all known drums, in default row order
pub fn drum_names() -> impl Iterator<Item = &'static str> {
    DRUM_MAP.iter().map(|(name, _)| *name)
}

/// Canonical pitch for a drum name
pub fn voice_for(name: &str) -> SequencerResult<Voice> {
    DRUM_MAP
        .iter()
        .find(|(drum, _)| *drum == name)
        .map(|(_, pitch)| *pitch)
        .ok_or_else(|| SequencerError::UnknownDrum(name.to_string()))
}

/// Drum name for any pitch of the extended map
pub fn drum_for_pitch(pitch: Voice) -> Option<&'static str> {
    EXTENDED_DRUM_MAP
        .iter()
        .find(|(_, pitches)| pitches.contains(&pitch))
        .map(|(name, _)| *name)
}

/// Map an alternate GM pitch onto its drum's canonical pitch
pub fn canonical_voice(pitch: Voice) -> Option<Voice> {
    EXTENDED_DRUM_MAP
        .iter()
        .find(|(_, pitches)| pitches.contains(&pitch))
        .map(|(_, pitches)| pitches[0])
}

/// Parse a preset such as `"kick:1,5,9;snare:5,13"`
///
/// Step numbers are 1-based. Returns (voice, 0-based step) pairs.
pub fn parse_preset(preset: &str) -> SequencerResult<Vec<(Voice, usize)>> {
    let mut cells = Vec::new();
    for part in preset.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (drum, steps) = part
            .split_once(':')
            .ok_or_else(|| SequencerError::InvalidPreset(part.to_string()))?;
        let voice = voice_for(drum.trim())?;
        for step in steps.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let number: usize = step
                .parse()
                .map_err(|_| SequencerError::InvalidPreset(part.to_string()))?;
            if number == 0 {
                return Err(SequencerError::InvalidPreset(part.to_string()));
            }
            cells.push((voice, number - 1));
        }
    }
    Ok(cells)
}
