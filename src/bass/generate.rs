// Bass line generation - Random, Markov chain and folded continuations
// A line holds at most one note per step; `None` is a rest.

use super::BASS_NOTES;
use crate::generation::Continuation;
use crate::sequencer::Voice;
use crate::sequencer::pattern::Pattern;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

fn is_bass_note(pitch: i32) -> bool {
    BASS_NOTES.iter().any(|(_, note)| i32::from(*note) == pitch)
}

/// Fold a generated pitch onto the bass rows
///
/// Pitches above the top row drop into the bass octave, then a sharp falls
/// to the natural below it. Anything still off the rows is rejected.
pub fn fold_pitch(pitch: Voice) -> Option<Voice> {
    let lowest = i32::from(BASS_NOTES[0].1);
    let highest = i32::from(BASS_NOTES[BASS_NOTES.len() - 1].1);

    let mut pitch = i32::from(pitch);
    if pitch > highest {
        pitch = lowest + pitch % 12;
    }
    if !is_bass_note(pitch) {
        pitch -= 1;
    }
    if is_bass_note(pitch) {
        Voice::try_from(pitch).ok()
    } else {
        None
    }
}

/// First note of each step
fn line_of(pattern: &Pattern) -> Vec<Option<Voice>> {
    pattern
        .steps()
        .iter()
        .map(|step| step.first().copied())
        .collect()
}

fn pattern_of(line: Vec<Option<Voice>>) -> Pattern {
    Pattern::from_steps(line.into_iter().map(|note| note.into_iter().collect()).collect())
}

/// Seed followed by uniformly chosen notes or rests up to `total_len`
///
/// Each generated step is a rest or one of the bass rows, with equal odds.
pub fn random_line<R: Rng + ?Sized>(seed: &Pattern, total_len: usize, rng: &mut R) -> Pattern {
    let mut line = line_of(&seed.extended_to(total_len));
    for slot in line.iter_mut().skip(seed.len()) {
        let index = rng.gen_range(0..=BASS_NOTES.len());
        *slot = index.checked_sub(1).map(|row| BASS_NOTES[row].1);
    }
    pattern_of(line)
}

/// Transition table built from a short input line
///
/// Every note may follow itself and the note after it (the last note wraps
/// to the first). Notes from the third position on may also jump back to the
/// first note.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkovChain {
    followers: BTreeMap<Option<Voice>, Vec<Option<Voice>>>,
}

impl MarkovChain {
    pub fn from_line(line: &[Option<Voice>]) -> Self {
        let mut followers: BTreeMap<Option<Voice>, Vec<Option<Voice>>> = BTreeMap::new();
        let Some(&first) = line.first() else {
            return Self { followers };
        };

        for (index, &note) in line.iter().enumerate() {
            let next = line.get(index + 1).copied().unwrap_or(first);
            let entry = followers.entry(note).or_default();
            entry.push(next);
            entry.push(note);
            if index > 1 {
                entry.push(first);
            }
        }
        Self { followers }
    }

    /// Candidates that may follow `note`, with repetitions as weights
    pub fn followers(&self, note: Option<Voice>) -> &[Option<Voice>] {
        self.followers.get(&note).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Pick the next note; a note with no entry leads to a rest
    pub fn next<R: Rng + ?Sized>(&self, note: Option<Voice>, rng: &mut R) -> Option<Voice> {
        self.followers(note).choose(rng).copied().flatten()
    }
}

/// Seed followed by a walk of the seed's Markov chain up to `total_len`
///
/// The walk starts from the last seed step.
pub fn markov_line<R: Rng + ?Sized>(seed: &Pattern, total_len: usize, rng: &mut R) -> Pattern {
    let input = line_of(seed);
    let chain = MarkovChain::from_line(&input);

    let mut line = line_of(&seed.extended_to(total_len));
    let mut current = input.last().copied().flatten();
    for slot in line.iter_mut().skip(seed.len()) {
        current = chain.next(current, rng);
        *slot = current;
    }
    pattern_of(line)
}

/// Merge a generator continuation after the seed, folding pitches
///
/// A later note on the same step replaces the earlier one.
pub fn place_bass_continuation(
    seed: &Pattern,
    continuation: &Continuation,
    total_len: usize,
) -> Pattern {
    let mut line = line_of(&seed.extended_to(total_len));
    let base = seed.len() as i64;

    for note in &continuation.notes {
        let step = base + i64::from(note.quantized_start_step);
        if step < base || step >= total_len as i64 {
            log::debug!("Dropping bass note {} at step {}", note.voice, step);
            continue;
        }
        match fold_pitch(note.voice) {
            Some(pitch) => line[step as usize] = Some(pitch),
            None => log::debug!("Dropping bass note {} off the rows", note.voice),
        }
    }
    pattern_of(line)
}
