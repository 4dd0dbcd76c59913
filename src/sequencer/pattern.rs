// Pattern - Ordered steps of voice sets
// A full pattern spans one loop; seeds are shorter slices of it

use crate::sequencer::Voice;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// An ordered sequence of steps, each holding the voices that are on
///
/// Voices within a step keep insertion order and never repeat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pattern {
    steps: Vec<Vec<Voice>>,
}

impl Pattern {
    /// Create a pattern of `len` empty steps
    pub fn new(len: usize) -> Self {
        Self {
            steps: vec![Vec::new(); len],
        }
    }

    /// Build a pattern from per-step voice lists, dropping duplicates
    pub fn from_steps(steps: Vec<Vec<Voice>>) -> Self {
        let mut pattern = Self::new(steps.len());
        for (index, voices) in steps.into_iter().enumerate() {
            for voice in voices {
                pattern.insert(index, voice);
            }
        }
        pattern
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Voices on at a step (empty slice past the end)
    pub fn step(&self, index: usize) -> &[Voice] {
        self.steps.get(index).map_or(&[], Vec::as_slice)
    }

    /// All steps in order
    pub fn steps(&self) -> &[Vec<Voice>] {
        &self.steps
    }

    /// Check whether a voice is on at a step
    pub fn contains(&self, index: usize, voice: Voice) -> bool {
        self.step(index).contains(&voice)
    }

    /// Add a voice to a step
    ///
    /// Returns false if the step does not exist or already holds the voice.
    pub fn insert(&mut self, index: usize, voice: Voice) -> bool {
        match self.steps.get_mut(index) {
            Some(voices) if !voices.contains(&voice) => {
                voices.push(voice);
                true
            }
            _ => false,
        }
    }

    /// Copy of a range of steps, padded with empty steps past the end
    pub fn slice(&self, range: Range<usize>) -> Pattern {
        Pattern {
            steps: range.map(|index| self.step(index).to_vec()).collect(),
        }
    }

    /// This pattern followed by `len - self.len()` empty steps
    pub fn extended_to(&self, len: usize) -> Pattern {
        let mut steps = self.steps.clone();
        steps.resize(len.max(steps.len()), Vec::new());
        Pattern { steps }
    }

    /// Total number of notes across all steps
    pub fn note_count(&self) -> usize {
        self.steps.iter().map(Vec::len).sum()
    }

    /// Flatten into the parallel note/step arrays of the wire protocol
    ///
    /// Step-major: every note of step 0 comes before any note of step 1.
    pub fn to_wire_format(&self) -> WirePattern {
        let mut wire = WirePattern::default();
        for (index, voices) in self.steps.iter().enumerate() {
            for &voice in voices {
                wire.notes.push(voice);
                wire.steps.push(index);
            }
        }
        wire
    }
}

/// Two parallel arrays: voice ids and the step each occurs at
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WirePattern {
    pub notes: Vec<Voice>,
    pub steps: Vec<usize>,
}

impl WirePattern {
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
