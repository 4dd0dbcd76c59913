// Generation module
// Seed extraction, generator capability and the two-stage generation cycle

pub mod note_seq;
pub mod orchestrator;
pub mod process;
pub mod random;
pub mod worker;

pub use orchestrator::{
    CycleStep, GenerationCycle, GenerationRequest, GenerationStage, MergeHooks, Orchestrator,
    place_continuation,
};
pub use process::ProcessGenerator;
pub use random::random_pattern;
pub use worker::{
    GenerationBackend, GeneratorReply, GeneratorWorker, InlineBackend, UnavailableBackend,
};

use crate::sequencer::pattern::{Pattern, WirePattern};
use crate::sequencer::{STEPS, SequencerError, Voice};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;
use thiserror::Error;

/// One generated note, relative to the end of the seed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationNote {
    #[serde(alias = "pitch")]
    pub voice: Voice,
    pub quantized_start_step: i32,
}

impl ContinuationNote {
    pub fn new(voice: Voice, quantized_start_step: i32) -> Self {
        Self {
            voice,
            quantized_start_step,
        }
    }
}

/// Sparse generator output
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Continuation {
    #[serde(default)]
    pub notes: Vec<ContinuationNote>,
}

impl Continuation {
    pub fn new(notes: Vec<ContinuationNote>) -> Self {
        Self { notes }
    }
}

/// Errors reported by a generator capability
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generator rejected the request: {0}")]
    Rejected(String),

    #[error("Generator not configured")]
    NotConfigured,

    #[error("Generator I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generator output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors failing a generation cycle
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    #[error("Generation cycle already complete")]
    CycleComplete,
}

pub type GenerationResult<T> = Result<T, GenerationError>;

/// Opaque pattern-continuation capability
///
/// Given a seed and a number of steps, produce notes for the steps after the
/// seed. Steps in the result are relative to the seed's end.
pub trait PatternGenerator: Send {
    /// Load whatever the generator needs before the first request
    fn initialize(&mut self) -> Result<(), GeneratorError> {
        Ok(())
    }

    fn continue_sequence(
        &mut self,
        seed: &Pattern,
        steps: usize,
        temperature: f64,
    ) -> Result<Continuation, GeneratorError>;
}

impl<F> PatternGenerator for F
where
    F: FnMut(&Pattern, usize, f64) -> Result<Continuation, GeneratorError> + Send,
{
    fn continue_sequence(
        &mut self,
        seed: &Pattern,
        steps: usize,
        temperature: f64,
    ) -> Result<Continuation, GeneratorError> {
        self(seed, steps, temperature)
    }
}

/// How the session produces new continuations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationMode {
    #[default]
    None,
    Ai,
    Random,
}

/// Output of one full generation cycle, in wire format
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DualPatternResult {
    pub original: WirePattern,
    pub filler: WirePattern,
}

/// Fixed split points and generator parameters
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub sequence_len: usize,
    pub input_len: usize,
    /// First step of the filler seed window. Not derived from `input_len`.
    pub filler_start: usize,
    pub filler_len: usize,
    pub temperature: f64,
    pub transition_duration: Duration,
}

impl GenerationSettings {
    pub fn seed_range(&self) -> Range<usize> {
        0..self.input_len
    }

    pub fn generation_range(&self) -> Range<usize> {
        self.input_len..self.sequence_len
    }

    pub fn filler_window(&self) -> Range<usize> {
        self.filler_start..self.filler_start + self.filler_len
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            sequence_len: STEPS,
            input_len: 6,
            filler_start: 10,
            filler_len: 6,
            temperature: 1.2,
            transition_duration: Duration::from_millis(600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = GenerationSettings::default();
        assert_eq!(settings.seed_range(), 0..6);
        assert_eq!(settings.generation_range(), 6..16);
        assert_eq!(settings.filler_window(), 10..16);
    }

    #[test]
    fn test_continuation_json() {
        let json = r#"{"notes":[{"pitch":38,"quantizedStartStep":3},{"voice":36,"quantizedStartStep":0}]}"#;
        let continuation: Continuation = serde_json::from_str(json).unwrap();
        assert_eq!(
            continuation.notes,
            vec![ContinuationNote::new(38, 3), ContinuationNote::new(36, 0)]
        );

        let empty: Continuation = serde_json::from_str("{}").unwrap();
        assert!(empty.notes.is_empty());
    }
}
