//! Bass sequencer next to the drum session on one shared transport

use mmi_drums::bass::{BASS_INPUT_LEN, bass_voices, note_for};
use mmi_drums::generation::InlineBackend;
use mmi_drums::midi::{SilentTrigger, SoundTrigger};
use mmi_drums::sequencer::ClockTick;
use mmi_drums::sequencer::transport::Clock;
use mmi_drums::{
    BassSequencer, BridgeClient, Continuation, GeneratorError, MemoryChannel, Pattern,
    PlaybackSession, SessionConfig, TransportController, TransportManager, Voice,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::{Arc, Mutex};
use std::time::Instant;

struct NullClock;

impl Clock for NullClock {
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn set_bpm(&mut self, _bpm: f64) {}
}

struct Recorder(Arc<Mutex<Vec<Voice>>>);

impl SoundTrigger for Recorder {
    fn play_voice(&mut self, voice: Voice, _at: Instant) {
        self.0.lock().unwrap().push(voice);
    }
}

fn empty_generator(_: &Pattern, _: usize, _: f64) -> Result<Continuation, GeneratorError> {
    Ok(Continuation::default())
}

#[test]
fn test_bass_and_drums_never_play_together() {
    let t0 = Instant::now();
    let shared = TransportManager::shared(Box::new(NullClock));
    let config = SessionConfig {
        preset: Some("kick:1".into()),
        ..SessionConfig::default()
    };

    let drum_hits = Arc::new(Mutex::new(Vec::new()));
    let mut drums = PlaybackSession::new(
        config.clone(),
        TransportController::new(shared.clone()),
        BridgeClient::new(MemoryChannel::new().0),
        Box::new(InlineBackend::new(Box::new(empty_generator))),
        Box::new(Recorder(drum_hits.clone())),
        t0,
    )
    .unwrap();

    let bass_notes = Arc::new(Mutex::new(Vec::new()));
    let mut bass = BassSequencer::new(
        TransportController::new(shared),
        Box::new(Recorder(bass_notes.clone())),
        &config,
    );
    bass.grid_mut().set_cell(note_for("C").unwrap(), 0, true).unwrap();

    let tick = ClockTick { step: 0, at: t0 };

    drums.play();
    drums.on_clock_tick(tick);
    bass.on_clock_tick(tick);
    assert_eq!(*drum_hits.lock().unwrap(), vec![36]);
    assert!(bass_notes.lock().unwrap().is_empty());

    // The bass takes the clock over
    bass.play();
    assert!(!drums.is_playing());
    drums.on_clock_tick(tick);
    bass.on_clock_tick(tick);
    assert_eq!(drum_hits.lock().unwrap().len(), 1);
    assert_eq!(*bass_notes.lock().unwrap(), vec![48]);

    drums.poll(t0);
    assert_eq!(drums.grid().active_column(), None);
    assert_eq!(bass.grid().active_column(), Some(0));

    // And hands it back
    drums.play();
    assert!(!bass.is_playing());
    bass.poll();
    assert_eq!(bass.grid().active_column(), None);
}

#[test]
fn test_markov_bass_follows_the_input() {
    let transport = TransportController::new(TransportManager::shared(Box::new(NullClock)));
    let mut bass = BassSequencer::new(transport, Box::new(SilentTrigger), &SessionConfig::default())
        .with_rng(StdRng::seed_from_u64(21));
    let now = Instant::now();

    for (note, step) in [("A", 0), ("E", 1), ("A", 2), ("G", 3)] {
        bass.user_toggle(note_for(note).unwrap(), step, now).unwrap();
    }
    bass.generate_markov();

    let sequence = bass.grid().sequence();
    let allowed: Vec<Voice> = ["A", "E", "G"].iter().map(|n| note_for(n).unwrap()).collect();
    for step in BASS_INPUT_LEN..sequence.len() {
        assert!(sequence.step(step).len() <= 1);
        assert!(sequence.step(step).iter().all(|v| allowed.contains(v)));
    }

    bass.generate_random();
    let sequence = bass.grid().sequence();
    let voices = bass_voices();
    assert_eq!(sequence.step(0), &[57]);
    for step in BASS_INPUT_LEN..sequence.len() {
        assert!(sequence.step(step).iter().all(|v| voices.contains(v)));
    }
}
