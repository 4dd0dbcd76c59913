// Bass module
// Monophonic bass line sharing the drum session's transport

pub mod generate;
pub mod sequencer;

pub use generate::{MarkovChain, fold_pitch, markov_line, place_bass_continuation, random_line};
pub use sequencer::BassSequencer;

use crate::sequencer::{SequencerError, SequencerResult, Voice};

/// Bass rows: the natural notes from C3 up, lowest first
pub const BASS_NOTES: [(&str, Voice); 7] = [
    ("C", 48),
    ("D", 50),
    ("E", 52),
    ("F", 53),
    ("G", 55),
    ("A", 57),
    ("B", 59),
];

/// Steps written by the user; generation fills the rest of the line
pub const BASS_INPUT_LEN: usize = 4;

/// Temperature passed to continuation generators
pub const BASS_TEMPERATURE: f64 = 1.0;

pub fn bass_voices() -> Vec<Voice> {
    BASS_NOTES.iter().map(|(_, pitch)| *pitch).collect()
}

/// Pitch for a note name, case-insensitive
pub fn note_for(name: &str) -> SequencerResult<Voice> {
    BASS_NOTES
        .iter()
        .find(|(note, _)| note.eq_ignore_ascii_case(name))
        .map(|(_, pitch)| *pitch)
        .ok_or_else(|| SequencerError::UnknownNote(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_lookup() {
        assert_eq!(note_for("C"), Ok(48));
        assert_eq!(note_for("g"), Ok(55));
        assert_eq!(
            note_for("C#"),
            Err(SequencerError::UnknownNote("C#".to_string()))
        );
        assert_eq!(bass_voices(), vec![48, 50, 52, 53, 55, 57, 59]);
    }
}
