// Orchestrator - Two-stage generation of the original and filler patterns

use super::{
    Continuation, DualPatternResult, GenerationError, GenerationResult, GenerationSettings,
    PatternGenerator,
};
use crate::sequencer::grid::Grid;
use crate::sequencer::pattern::Pattern;
use crate::sequencer::transition::{PatternTransition, TransitionHooks};
use crate::sequencer::{SequencerResult, Voice};
use std::time::Instant;

/// Seed followed by the continuation notes that land inside `[seed.len(), total_len)`
///
/// Notes outside that range, or for voices not in `voices`, are dropped.
pub fn place_continuation(
    seed: &Pattern,
    continuation: &Continuation,
    total_len: usize,
    voices: &[Voice],
) -> Pattern {
    let mut pattern = seed.extended_to(total_len);
    let base = seed.len() as i64;

    for note in &continuation.notes {
        let step = base + note.quantized_start_step as i64;
        if step < base || step >= total_len as i64 {
            log::debug!(
                "Dropping generated note {} at out-of-range step {}",
                note.voice,
                step
            );
            continue;
        }
        if !voices.contains(&note.voice) {
            log::debug!("Dropping generated note with unknown voice {}", note.voice);
            continue;
        }
        pattern.insert(step as usize, note.voice);
    }
    pattern
}

/// Hooks merging a generated pattern into the grid
///
/// The target range is cleared up front, then every written cell is pulsed
/// and switched on again if the target has it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeHooks;

impl TransitionHooks for MergeHooks {
    fn on_start(&mut self, grid: &mut Grid, start_col: usize, end_col: usize) -> SequencerResult<()> {
        grid.clear(start_col, end_col + 1);
        Ok(())
    }

    fn on_cell(&mut self, grid: &mut Grid, voice: Voice, col: usize, on: bool) -> SequencerResult<()> {
        grid.pulse_cell(voice, col)?;
        if on {
            grid.set_cell(voice, col, true)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStage {
    Original,
    Filler,
    Complete,
}

/// A pending call to the generator capability
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub stage: GenerationStage,
    pub seed: Pattern,
    pub steps: usize,
    pub temperature: f64,
}

/// What the caller has to do after feeding a continuation
#[derive(Debug)]
pub enum CycleStep {
    /// Run the filler request; animate `transition` with `MergeHooks` meanwhile
    Filler {
        request: GenerationRequest,
        transition: Option<PatternTransition>,
    },
    Complete(DualPatternResult),
}

/// Resumable generation cycle
///
/// `begin` yields the first request; each generator reply goes back in
/// through `resume`. Stages run strictly in order.
#[derive(Debug, Clone)]
pub struct GenerationCycle {
    settings: GenerationSettings,
    stage: GenerationStage,
    seed: Pattern,
    original: Option<Pattern>,
}

impl GenerationCycle {
    pub fn begin(grid: &Grid, settings: &GenerationSettings) -> (Self, GenerationRequest) {
        let seed = grid.sequence().slice(settings.seed_range());
        let request = GenerationRequest {
            stage: GenerationStage::Original,
            steps: settings.sequence_len.saturating_sub(seed.len()),
            seed: seed.clone(),
            temperature: settings.temperature,
        };

        let cycle = Self {
            settings: settings.clone(),
            stage: GenerationStage::Original,
            seed,
            original: None,
        };
        (cycle, request)
    }

    pub fn stage(&self) -> GenerationStage {
        self.stage
    }

    /// Generated original pattern, once the first stage has completed
    pub fn original(&self) -> Option<&Pattern> {
        self.original.as_ref()
    }

    /// Feed the generator's reply for the current stage
    pub fn resume(
        &mut self,
        grid: &mut Grid,
        continuation: &Continuation,
        now: Instant,
    ) -> GenerationResult<CycleStep> {
        let voices = grid.voices().to_vec();
        let total = self.settings.sequence_len;

        match self.stage {
            GenerationStage::Original => {
                let pattern = place_continuation(&self.seed, continuation, total, &voices);

                let mut transition = PatternTransition::new(
                    pattern.clone(),
                    self.settings.transition_duration,
                    self.settings.input_len,
                    total.saturating_sub(1),
                );
                if let Some(transition) = transition.as_mut() {
                    transition.start(grid, &mut MergeHooks, now)?;
                }

                let seed = pattern.slice(self.settings.filler_window());
                let request = GenerationRequest {
                    stage: GenerationStage::Filler,
                    steps: total.saturating_sub(seed.len()),
                    seed,
                    temperature: self.settings.temperature,
                };

                self.original = Some(pattern);
                self.stage = GenerationStage::Filler;
                Ok(CycleStep::Filler {
                    request,
                    transition,
                })
            }
            GenerationStage::Filler => {
                let original = self.original.take().ok_or(GenerationError::CycleComplete)?;
                let seed = original.slice(self.settings.filler_window());
                let filler = place_continuation(&seed, continuation, total, &voices);

                self.stage = GenerationStage::Complete;
                Ok(CycleStep::Complete(DualPatternResult {
                    original: original.to_wire_format(),
                    filler: filler.to_wire_format(),
                }))
            }
            GenerationStage::Complete => Err(GenerationError::CycleComplete),
        }
    }
}

/// Blocking driver for a generation cycle
pub struct Orchestrator {
    generator: Box<dyn PatternGenerator>,
    settings: GenerationSettings,
}

impl Orchestrator {
    pub fn new(generator: Box<dyn PatternGenerator>, settings: GenerationSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn initialize(&mut self) -> GenerationResult<()> {
        self.generator.initialize()?;
        Ok(())
    }

    /// Run both stages, merging the original pattern into the grid
    ///
    /// The merge is written in one go instead of paced. On a generator
    /// failure the seed is intact and the generation range is indeterminate.
    pub fn generate(&mut self, grid: &mut Grid) -> GenerationResult<DualPatternResult> {
        let (mut cycle, mut request) = GenerationCycle::begin(grid, &self.settings);

        loop {
            let continuation = self.generator.continue_sequence(
                &request.seed,
                request.steps,
                request.temperature,
            )?;

            match cycle.resume(grid, &continuation, Instant::now())? {
                CycleStep::Filler {
                    request: next,
                    transition,
                } => {
                    if let Some(mut transition) = transition {
                        transition.finish(grid, &mut MergeHooks)?;
                    }
                    request = next;
                }
                CycleStep::Complete(result) => return Ok(result),
            }
        }
    }
}
