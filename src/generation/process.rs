// Process generator - Delegates continuation to an external command
// The request is written as JSON on stdin, the continuation read from stdout

use super::note_seq::{DEFAULT_QPM, NoteSequence, STEPS_PER_QUARTER};
use super::{Continuation, GeneratorError, PatternGenerator};
use crate::sequencer::drums::canonical_voice;
use crate::sequencer::pattern::Pattern;
use serde::Serialize;
use std::io::Write;
use std::process::{Command, Stdio};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    note_sequence: &'a NoteSequence,
    steps: usize,
    temperature: f64,
}

/// Generator backed by an external program
///
/// The program reads one request object and prints one object of the form
/// `{"notes":[{"pitch":38,"quantizedStartStep":3}]}`. Pitches are folded
/// onto the canonical drum pitches; unknown pitches are dropped.
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
    program: String,
    args: Vec<String>,
}

impl ProcessGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from a whitespace-separated command line
    pub fn from_command_line(command: &str) -> Result<Self, GeneratorError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(GeneratorError::NotConfigured)?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn run(&self, input: &[u8]) -> Result<Vec<u8>, GeneratorError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input)?;
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(GeneratorError::Rejected(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        Ok(output.stdout)
    }
}

impl PatternGenerator for ProcessGenerator {
    fn initialize(&mut self) -> Result<(), GeneratorError> {
        if self.program.is_empty() {
            return Err(GeneratorError::NotConfigured);
        }
        log::info!("Using external generator: {}", self.program);
        Ok(())
    }

    fn continue_sequence(
        &mut self,
        seed: &Pattern,
        steps: usize,
        temperature: f64,
    ) -> Result<Continuation, GeneratorError> {
        let note_sequence = NoteSequence::from_pattern(seed, STEPS_PER_QUARTER, DEFAULT_QPM);
        let request = ProcessRequest {
            note_sequence: &note_sequence,
            steps,
            temperature,
        };
        let input = serde_json::to_vec(&request)?;

        let output = self.run(&input)?;
        let raw: Continuation = serde_json::from_slice(&output)?;
        Ok(normalize(raw))
    }
}

/// Fold alternate pitches onto canonical drum voices
fn normalize(continuation: Continuation) -> Continuation {
    let notes = continuation
        .notes
        .into_iter()
        .filter_map(|mut note| {
            note.voice = canonical_voice(note.voice)?;
            Some(note)
        })
        .collect();
    Continuation { notes }
}
