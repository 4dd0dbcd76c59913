// Note sequence - Seed encoding handed to external generators
// Field names follow the usual note-sequence JSON layout (camelCase)

use crate::sequencer::Voice;
use crate::sequencer::pattern::Pattern;
use serde::{Deserialize, Serialize};

/// MIDI ticks per quarter note (PPQ)
pub const TICKS_PER_QUARTER: u32 = 220;
pub const DEFAULT_VELOCITY: u8 = 100;
pub const STEPS_PER_QUARTER: u32 = 4;
pub const DEFAULT_QPM: f64 = 120.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceNote {
    pub pitch: Voice,
    pub velocity: u8,
    pub start_time: f64,
    pub end_time: f64,
    pub quantized_start_step: u32,
    pub quantized_end_step: u32,
    pub is_drum: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub time: f64,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    pub time: f64,
    pub qpm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantizationInfo {
    pub steps_per_quarter: u32,
}

/// A quantized drum note sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSequence {
    pub ticks_per_quarter: u32,
    pub total_time: f64,
    pub total_quantized_steps: u32,
    pub time_signatures: Vec<TimeSignature>,
    pub tempos: Vec<Tempo>,
    pub quantization_info: QuantizationInfo,
    pub notes: Vec<SequenceNote>,
}

impl NoteSequence {
    /// Encode a pattern, one note per voice per step, each lasting one step
    pub fn from_pattern(pattern: &Pattern, steps_per_quarter: u32, qpm: f64) -> Self {
        let step_seconds = 60.0 / qpm / steps_per_quarter as f64;
        let start = |step: usize| step as f64 * step_seconds;

        let notes = pattern
            .steps()
            .iter()
            .enumerate()
            .flat_map(|(index, voices)| {
                voices.iter().map(move |&pitch| SequenceNote {
                    pitch,
                    velocity: DEFAULT_VELOCITY,
                    start_time: start(index),
                    end_time: start(index + 1),
                    quantized_start_step: index as u32,
                    quantized_end_step: index as u32 + 1,
                    is_drum: true,
                })
            })
            .collect();

        Self {
            ticks_per_quarter: TICKS_PER_QUARTER,
            total_time: start(pattern.len()),
            total_quantized_steps: pattern.len() as u32,
            time_signatures: vec![TimeSignature {
                time: 0.0,
                numerator: 4,
                denominator: 4,
            }],
            tempos: vec![Tempo { time: 0.0, qpm }],
            quantization_info: QuantizationInfo { steps_per_quarter },
            notes,
        }
    }
}
