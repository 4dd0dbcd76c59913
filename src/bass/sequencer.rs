// Bass sequencer - Monophonic grid on its own transport controller
//
// Shares the step clock with the drum session through the transport manager:
// starting one stops the other.

use super::generate::{markov_line, place_bass_continuation, random_line};
use super::{BASS_INPUT_LEN, BASS_TEMPERATURE, bass_voices};
use crate::config::SessionConfig;
use crate::generation::{Continuation, GeneratorError, PatternGenerator};
use crate::messaging::listeners::SubscriptionId;
use crate::midi::output::SoundTrigger;
use crate::sequencer::clock::ClockTick;
use crate::sequencer::grid::Grid;
use crate::sequencer::pattern::Pattern;
use crate::sequencer::transport::{TransportController, TransportEvent};
use crate::sequencer::{STEPS, SequencerResult, Voice};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

pub struct BassSequencer {
    grid: Grid,
    transport: TransportController,
    transport_events: Receiver<TransportEvent>,
    transport_subscriptions: Vec<SubscriptionId>,
    sound: Box<dyn SoundTrigger>,
    rng: StdRng,
    bpm: f64,
    min_bpm: f64,
    max_bpm: f64,
}

impl BassSequencer {
    /// Tempo and BPM range come from the session config
    pub fn new(
        transport: TransportController,
        sound: Box<dyn SoundTrigger>,
        config: &SessionConfig,
    ) -> Self {
        let (event_tx, transport_events) = mpsc::channel();
        let transport_subscriptions = [TransportEvent::Started, TransportEvent::Stopped]
            .into_iter()
            .map(|kind| {
                let tx = event_tx.clone();
                transport.on_event(kind, move |event| {
                    let _ = tx.send(*event);
                })
            })
            .collect();

        Self {
            grid: Grid::new(bass_voices(), STEPS).with_monophonic(true),
            transport,
            transport_events,
            transport_subscriptions,
            sound,
            rng: StdRng::from_entropy(),
            bpm: config.clamp_bpm(config.tempo),
            min_bpm: config.min_bpm,
            max_bpm: config.max_bpm,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_running()
    }

    pub fn play(&mut self) {
        if !self.is_playing() {
            self.transport.start(self.bpm);
            log::info!("Bass started at {} BPM", self.bpm);
        }
    }

    pub fn stop(&mut self) {
        if self.is_playing() {
            self.transport.stop();
            log::info!("Bass stopped");
        }
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.stop();
        } else {
            self.play();
        }
    }

    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.bpm = bpm.clamp(self.min_bpm, self.max_bpm);
        if self.is_playing() {
            self.transport.set_bpm(self.bpm);
        }
        self.bpm
    }

    /// Toggle a note; switching one on while stopped previews it
    pub fn user_toggle(
        &mut self,
        voice: Voice,
        step: usize,
        now: Instant,
    ) -> SequencerResult<Option<bool>> {
        let result = self.grid.toggle_cell(voice, step)?;
        if result == Some(true) && !self.is_playing() {
            self.sound.play_voice(voice, now);
        }
        Ok(result)
    }

    pub fn clear(&mut self) {
        self.grid.clear_all();
    }

    pub fn on_clock_tick(&mut self, tick: ClockTick) {
        if !self.is_playing() {
            return;
        }
        let step = tick.step % self.grid.steps();
        for voice in self.grid.sequence().step(step).to_vec() {
            self.sound.play_voice(voice, tick.at);
        }
        self.grid.set_active_column(Some(step));
    }

    /// Pick up transport notifications
    pub fn poll(&mut self) {
        while let Ok(event) = self.transport_events.try_recv() {
            if event == TransportEvent::Stopped {
                self.grid.set_active_column(None);
            }
        }
    }

    fn seed(&self) -> Pattern {
        self.grid.sequence().slice(0..BASS_INPUT_LEN)
    }

    /// Fill the line after the input steps with random notes and rests
    pub fn generate_random(&mut self) -> usize {
        let line = random_line(&self.seed(), self.grid.steps(), &mut self.rng);
        self.write_line(&line)
    }

    /// Continue the input steps with a walk of their Markov chain
    pub fn generate_markov(&mut self) -> usize {
        let line = markov_line(&self.seed(), self.grid.steps(), &mut self.rng);
        self.write_line(&line)
    }

    /// Write a generator continuation after the input steps
    pub fn apply_continuation(&mut self, continuation: &Continuation) -> usize {
        let line = place_bass_continuation(&self.seed(), continuation, self.grid.steps());
        self.write_line(&line)
    }

    /// Ask `generator` for a continuation and write it
    ///
    /// On failure the line is left as it was.
    pub fn generate_with(
        &mut self,
        generator: &mut dyn PatternGenerator,
    ) -> Result<usize, GeneratorError> {
        let steps = self.grid.steps().saturating_sub(BASS_INPUT_LEN);
        let continuation = generator.continue_sequence(&self.seed(), steps, BASS_TEMPERATURE)?;
        Ok(self.apply_continuation(&continuation))
    }

    /// Replace the generated steps with `line`; returns the notes written
    fn write_line(&mut self, line: &Pattern) -> usize {
        let steps = self.grid.steps();
        self.grid.clear(BASS_INPUT_LEN, steps);

        let mut written = 0;
        for step in BASS_INPUT_LEN..steps.min(line.len()) {
            for &voice in line.step(step) {
                match self.grid.set_cell(voice, step, true) {
                    Ok(()) => written += 1,
                    Err(e) => log::warn!("Skipping bass note: {}", e),
                }
            }
        }
        log::debug!("Bass line rewritten with {} notes", written);
        written
    }
}

impl Drop for BassSequencer {
    fn drop(&mut self) {
        for id in self.transport_subscriptions.drain(..) {
            self.transport.unsubscribe(id);
        }
    }
}
