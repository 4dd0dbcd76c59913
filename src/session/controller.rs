// Playback session - Wires grid, transport, generator backend and bridge together
//
// Everything runs on the caller's loop: clock ticks are fed in with
// `on_clock_tick`, the rest (generator replies, transition columns, bridge
// feedback, transport notifications, idle timeout) is picked up by `poll`.

use super::idle::IdleTimer;
use super::{SessionError, SessionResult};
use crate::bridge::channel::BridgeChannel;
use crate::bridge::client::{BridgeClient, BridgeEvent};
use crate::config::SessionConfig;
use crate::generation::orchestrator::{CycleStep, GenerationCycle, MergeHooks};
use crate::generation::worker::{GenerationBackend, GeneratorReply};
use crate::generation::{
    Continuation, DualPatternResult, GenerationMode, GenerationSettings, random_pattern,
};
use crate::messaging::channels::NotificationProducer;
use crate::messaging::command::Command;
use crate::messaging::listeners::SubscriptionId;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::midi::output::SoundTrigger;
use crate::sequencer::clock::ClockTick;
use crate::sequencer::grid::Grid;
use crate::sequencer::pattern::{Pattern, WirePattern};
use crate::sequencer::transition::{PatternTransition, TransitionStatus};
use crate::sequencer::transport::{TransportController, TransportEvent};
use crate::sequencer::{Voice, drums};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ringbuf::traits::Producer;
use std::sync::mpsc::{self, Receiver};
use std::time::Instant;

pub struct PlaybackSession<C: BridgeChannel> {
    config: SessionConfig,
    settings: GenerationSettings,
    grid: Grid,

    transport: TransportController,
    transport_events: Receiver<TransportEvent>,
    transport_subscriptions: Vec<SubscriptionId>,

    bridge: BridgeClient<C>,
    backend: Box<dyn GenerationBackend>,
    sound: Box<dyn SoundTrigger>,
    notifications: Option<NotificationProducer>,
    rng: StdRng,

    mode: GenerationMode,
    bpm: f64,
    loop_play_count: u32,
    should_regenerate: bool,
    loops_since_last_input: u32,
    idle: IdleTimer,

    cycle: Option<GenerationCycle>,
    transition: Option<PatternTransition>,
}

impl<C: BridgeChannel> PlaybackSession<C> {
    pub fn new(
        config: SessionConfig,
        transport: TransportController,
        bridge: BridgeClient<C>,
        backend: Box<dyn GenerationBackend>,
        sound: Box<dyn SoundTrigger>,
        now: Instant,
    ) -> SessionResult<Self> {
        config.validate()?;

        let mut grid = Grid::new(config.voices()?, config.sequence_len)
            .with_monophonic(config.monophonic);
        if !config.editable_output {
            grid.lock_columns(config.input_len, config.sequence_len - 1, true);
        }
        if let Some(preset) = &config.preset {
            load_preset(&mut grid, preset)?;
        }

        // Forwarded through a queue: subscribers run under the transport lock
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

        let mut idle = IdleTimer::new(config.idle_timeout());
        idle.touch(now);

        Ok(Self {
            settings: config.generation_settings(),
            mode: config.generation_mode,
            bpm: config.clamp_bpm(config.tempo),
            config,
            grid,
            transport,
            transport_events,
            transport_subscriptions,
            bridge,
            backend,
            sound,
            notifications: None,
            rng: StdRng::from_entropy(),
            loop_play_count: 0,
            should_regenerate: false,
            loops_since_last_input: 0,
            idle,
            cycle: None,
            transition: None,
        })
    }

    /// Push user-facing notifications into `producer`
    pub fn with_notifications(mut self, producer: NotificationProducer) -> Self {
        self.notifications = Some(producer);
        self
    }

    /// Use a fixed RNG for random generation
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.grid
    }

    pub fn bridge(&self) -> &BridgeClient<C> {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut BridgeClient<C> {
        &mut self.bridge
    }

    pub fn generation_mode(&self) -> GenerationMode {
        self.mode
    }

    pub fn set_generation_mode(&mut self, mode: GenerationMode) {
        self.mode = mode;
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_running()
    }

    pub fn loop_play_count(&self) -> u32 {
        self.loop_play_count
    }

    pub fn loops_since_last_input(&self) -> u32 {
        self.loops_since_last_input
    }

    pub fn should_regenerate(&self) -> bool {
        self.should_regenerate
    }

    pub fn idle_timer(&self) -> &IdleTimer {
        &self.idle
    }

    /// A generation cycle or a pattern transition is still running
    pub fn generation_in_flight(&self) -> bool {
        self.cycle.is_some() || self.transition.is_some()
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    pub fn play(&mut self) {
        if self.is_playing() {
            return;
        }
        self.loop_play_count = 0;
        self.loops_since_last_input = 0;
        self.idle.cancel();
        self.transport.start(self.bpm);
        log::info!("Playback started at {} BPM", self.bpm);
    }

    pub fn stop(&mut self, now: Instant) {
        if !self.is_playing() {
            return;
        }
        self.transport.stop();
        self.idle.touch(now);
        log::info!("Playback stopped");
    }

    pub fn toggle_play(&mut self, now: Instant) {
        if self.is_playing() {
            self.stop(now);
        } else {
            self.play();
        }
    }

    /// Set the tempo, clamped to the configured range; returns the value kept
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.bpm = self.config.clamp_bpm(bpm);
        if self.is_playing() {
            self.transport.set_bpm(self.bpm);
        }
        self.bpm
    }

    // ------------------------------------------------------------------
    // User input
    // ------------------------------------------------------------------

    /// Pointer or keyboard activity; reschedules the idle timer while stopped
    pub fn note_activity(&mut self, now: Instant) {
        if !self.is_playing() {
            self.idle.touch(now);
        }
    }

    /// Toggle a cell on behalf of the user
    ///
    /// Returns the new state, or `None` if the column is locked.
    pub fn user_toggle(
        &mut self,
        voice: Voice,
        step: usize,
        now: Instant,
    ) -> SessionResult<Option<bool>> {
        self.note_activity(now);
        let result = self.grid.toggle_cell(voice, step)?;

        match result {
            Some(true) if !self.is_playing() => self.sound.play_voice(voice, now),
            Some(_) if self.is_playing() => self.user_edited(),
            _ => {}
        }
        Ok(result)
    }

    /// Clear the whole grid on behalf of the user
    pub fn clear(&mut self, now: Instant) {
        self.note_activity(now);
        self.grid.clear_all();
        if self.is_playing() {
            self.user_edited();
        }
    }

    fn user_edited(&mut self) {
        self.should_regenerate = true;
        self.loops_since_last_input = 0;
    }

    pub fn handle_command(&mut self, command: Command, now: Instant) -> SessionResult<()> {
        match command {
            Command::Toggle { voice, step } => {
                if self.user_toggle(voice, step, now)?.is_none() {
                    log::debug!("Step {} is locked", step + 1);
                }
            }
            Command::Play => self.play(),
            Command::Stop => self.stop(now),
            Command::TogglePlay => self.toggle_play(now),
            Command::Generate => {
                self.note_activity(now);
                self.request_generation(now)?;
            }
            Command::Random => {
                self.note_activity(now);
                self.generate_random(now)?;
            }
            Command::Clear => self.clear(now),
            Command::SetBpm(bpm) => {
                self.note_activity(now);
                let bpm = self.set_bpm(bpm);
                log::info!("Tempo set to {} BPM", bpm);
            }
            // Presentation, lifetime and the bass line belong to the caller
            Command::Show | Command::Quit | Command::Bass(_) => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    fn ensure_idle_generation(&self) -> SessionResult<()> {
        if self.generation_in_flight() {
            return Err(SessionError::GenerationInFlight);
        }
        Ok(())
    }

    /// Start a two-stage generation cycle on the backend
    pub fn request_generation(&mut self, _now: Instant) -> SessionResult<()> {
        self.ensure_idle_generation()?;
        if !self.backend.is_ready() {
            return Err(SessionError::NotInitialized);
        }

        let (cycle, request) = GenerationCycle::begin(&self.grid, &self.settings);
        if !self.backend.submit(request) {
            return Err(SessionError::NotInitialized);
        }
        log::debug!("Generation cycle started");
        self.cycle = Some(cycle);
        Ok(())
    }

    /// Replace the generation range with random hits and send it as the original
    pub fn generate_random(&mut self, now: Instant) -> SessionResult<WirePattern> {
        self.ensure_idle_generation()?;

        let seed = self.grid.sequence().slice(self.settings.seed_range());
        let voices = self.grid.voices().to_vec();
        let pattern = random_pattern(
            &seed,
            &voices,
            self.settings.sequence_len,
            self.config.random_probability,
            &mut self.rng,
        );
        let wire = pattern.to_wire_format();

        self.start_transition(pattern_transition(&self.settings, pattern), now)?;
        self.bridge.send_wire(&wire, false);
        log::debug!("Random pattern with {} notes", wire.len());
        Ok(wire)
    }

    fn start_transition(
        &mut self,
        transition: Option<PatternTransition>,
        now: Instant,
    ) -> SessionResult<()> {
        if let Some(mut transition) = transition {
            let status = transition.start(&mut self.grid, &mut MergeHooks, now)?;
            if status == TransitionStatus::Running {
                self.transition = Some(transition);
            }
        }
        Ok(())
    }

    fn regenerate(&mut self, now: Instant) {
        let result = match self.mode {
            GenerationMode::None => return,
            GenerationMode::Ai => self.request_generation(now),
            GenerationMode::Random => self.generate_random(now).map(|_| ()),
        };
        match result {
            Ok(()) => {}
            Err(SessionError::GenerationInFlight) => {
                log::debug!("Regeneration skipped, generation in flight");
            }
            Err(e) => {
                log::warn!("Regeneration failed: {}", e);
                self.notify(Notification::warning(
                    NotificationCategory::Generator,
                    format!("Regeneration failed: {}", e),
                ));
            }
        }
    }

    fn on_continuation(&mut self, continuation: Continuation, now: Instant) {
        let Some(mut cycle) = self.cycle.take() else {
            log::warn!("Generator reply without a pending cycle");
            return;
        };

        match cycle.resume(&mut self.grid, &continuation, now) {
            Ok(CycleStep::Filler {
                request,
                transition,
            }) => {
                if let Some(transition) = transition {
                    self.transition = Some(transition);
                }
                if self.backend.submit(request) {
                    self.cycle = Some(cycle);
                } else {
                    self.generation_failed("generator refused the filler request");
                }
            }
            Ok(CycleStep::Complete(result)) => self.send_result(&result),
            Err(e) => self.generation_failed(&e.to_string()),
        }
    }

    fn send_result(&mut self, result: &DualPatternResult) {
        log::info!(
            "Generated original ({} notes) and filler ({} notes)",
            result.original.len(),
            result.filler.len()
        );
        self.bridge.send_wire(&result.original, false);
        self.bridge.send_wire(&result.filler, true);
    }

    fn generation_failed(&mut self, reason: &str) {
        self.cycle = None;
        log::error!("Generation failed: {}", reason);
        self.notify(Notification::error(
            NotificationCategory::Generator,
            format!("Generation failed: {}", reason),
        ));
    }

    fn drain_backend(&mut self, now: Instant) {
        while let Some(reply) = self.backend.poll() {
            match reply {
                GeneratorReply::Ready => {
                    log::info!("Generator ready");
                    self.notify(Notification::info(
                        NotificationCategory::Generator,
                        "Generator ready",
                    ));
                }
                GeneratorReply::InitFailed(e) => {
                    log::error!("Generator initialisation failed: {}", e);
                    self.notify(Notification::error(
                        NotificationCategory::Generator,
                        format!("Generator unavailable: {}", e),
                    ));
                }
                GeneratorReply::Continuation(Ok(continuation)) => {
                    self.on_continuation(continuation, now)
                }
                GeneratorReply::Continuation(Err(e)) => self.generation_failed(&e.to_string()),
            }
        }
    }

    // ------------------------------------------------------------------
    // Clock and polling
    // ------------------------------------------------------------------

    /// Handle one step of the shared clock
    pub fn on_clock_tick(&mut self, tick: ClockTick) {
        if !self.is_playing() {
            return;
        }
        let step = tick.step % self.grid.steps();

        let voices = self.grid.voices().to_vec();
        for voice in voices {
            if self.grid.get_cell(voice, step).unwrap_or(false) {
                self.sound.play_voice(voice, tick.at);
            }
        }

        // The player's beat feedback drives the highlight when it is there
        if !self.bridge.is_connected() {
            self.grid.set_active_column(Some(step));
        }

        if step == 0 {
            self.on_loop_start(tick.at);
        }
    }

    fn on_loop_start(&mut self, now: Instant) {
        self.loop_play_count += 1;
        if let Some(mode) = self.config.play_schedule.mode_for(self.loop_play_count) {
            log::debug!("Loop {}: play mode {:?}", self.loop_play_count, mode);
            self.bridge.set_play_mode(mode);
        }

        if self.loops_since_last_input >= self.config.idle_loop_limit {
            log::info!(
                "No input for {} loops, stopping",
                self.loops_since_last_input
            );
            self.stop(now);
            self.notify(Notification::info(
                NotificationCategory::Session,
                "Stopped after too many loops without input",
            ));
            return;
        }
        self.loops_since_last_input += 1;

        if self.should_regenerate || self.loop_play_count >= self.config.cycle_length {
            self.regenerate(now);
            self.should_regenerate = false;
            self.loop_play_count = 0;
        }
    }

    /// Advance everything that does not come from the clock
    pub fn poll(&mut self, now: Instant) {
        self.drain_backend(now);
        self.poll_transition(now);

        for event in self.bridge.poll(now) {
            match event {
                BridgeEvent::Beat { step, .. } => {
                    let last = self.grid.steps() as i32 - 1;
                    self.grid.set_active_column(Some(step.clamp(0, last) as usize));
                }
                BridgeEvent::Connection(connected) => {
                    let message = if connected {
                        "Bridge connected"
                    } else {
                        "Bridge disconnected"
                    };
                    self.notify(Notification::info(NotificationCategory::Bridge, message));
                }
                BridgeEvent::Message(message) => {
                    log::debug!("Unhandled bridge message {}", message.addr);
                }
            }
        }

        while let Ok(event) = self.transport_events.try_recv() {
            match event {
                TransportEvent::Started => self.idle.cancel(),
                TransportEvent::Stopped => {
                    self.grid.set_active_column(None);
                    self.idle.touch(now);
                }
            }
        }

        if !self.is_playing() && self.idle.expired(now) {
            self.idle.cancel();
            self.stop(now);
            self.grid.clear_all();
            log::info!("Idle timeout, grid cleared");
            self.notify(Notification::info(
                NotificationCategory::Session,
                "Idle timeout, grid cleared",
            ));
        }
    }

    fn poll_transition(&mut self, now: Instant) {
        let Some(transition) = self.transition.as_mut() else {
            return;
        };
        match transition.poll(&mut self.grid, &mut MergeHooks, now) {
            Ok(TransitionStatus::Running) => {}
            Ok(_) => self.transition = None,
            Err(e) => {
                self.transition = None;
                log::error!("Pattern transition aborted: {}", e);
            }
        }
    }

    fn notify(&mut self, notification: Notification) {
        if let Some(tx) = self.notifications.as_mut() {
            let _ = tx.try_push(notification);
        }
    }
}

impl<C: BridgeChannel> Drop for PlaybackSession<C> {
    fn drop(&mut self) {
        for id in self.transport_subscriptions.drain(..) {
            self.transport.unsubscribe(id);
        }
    }
}

fn pattern_transition(
    settings: &GenerationSettings,
    pattern: Pattern,
) -> Option<PatternTransition> {
    PatternTransition::new(
        pattern,
        settings.transition_duration,
        settings.input_len,
        settings.sequence_len.saturating_sub(1),
    )
}

/// Switch on the cells of a preset string; unknown rows are skipped
fn load_preset(grid: &mut Grid, preset: &str) -> SessionResult<()> {
    for (voice, step) in drums::parse_preset(preset)? {
        if let Err(e) = grid.set_cell(voice, step, true) {
            log::warn!("Skipping preset cell: {}", e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::{MemoryChannel, MemoryHandle};
    use crate::bridge::protocol::PlayMode;
    use crate::generation::worker::InlineBackend;
    use crate::generation::{ContinuationNote, GeneratorError};
    use crate::midi::output::SilentTrigger;
    use crate::sequencer::transport::{Clock, TransportManager};
    use rosc::OscType;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

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

    fn generator(_: &Pattern, _: usize, _: f64) -> Result<Continuation, GeneratorError> {
        Ok(Continuation::new(vec![ContinuationNote::new(38, 0)]))
    }

    fn session_with(
        config: SessionConfig,
        sound: Box<dyn SoundTrigger>,
    ) -> (PlaybackSession<MemoryChannel>, MemoryHandle, Instant) {
        let (channel, handle) = MemoryChannel::new();
        let bridge = BridgeClient::new(channel).with_settle_delay(Duration::ZERO);
        let transport = TransportController::new(TransportManager::shared(Box::new(NullClock)));
        let backend = Box::new(InlineBackend::new(Box::new(generator)));
        let now = Instant::now();
        let session = PlaybackSession::new(config, transport, bridge, backend, sound, now)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(3));
        (session, handle, now)
    }

    fn session() -> (PlaybackSession<MemoryChannel>, MemoryHandle, Instant) {
        session_with(SessionConfig::default(), Box::new(SilentTrigger))
    }

    fn tick(step: usize, at: Instant) -> ClockTick {
        ClockTick { step, at }
    }

    #[test]
    fn test_output_columns_locked() {
        let (mut session, _, now) = session();
        assert_eq!(session.user_toggle(36, 8, now).unwrap(), None);
        assert_eq!(session.user_toggle(36, 2, now).unwrap(), Some(true));
        assert!(session.user_toggle(7, 2, now).is_err());
    }

    #[test]
    fn test_preset_loaded() {
        let config = SessionConfig {
            preset: Some("kick:1,5;snare:3".to_string()),
            ..SessionConfig::default()
        };
        let (session, _, _) = session_with(config, Box::new(SilentTrigger));
        assert!(session.grid().get_cell(36, 0).unwrap());
        assert!(session.grid().get_cell(36, 4).unwrap());
        assert!(session.grid().get_cell(38, 2).unwrap());
    }

    #[test]
    fn test_preview_sound_only_when_stopped() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let (mut session, _, now) =
            session_with(SessionConfig::default(), Box::new(Recorder(played.clone())));

        session.user_toggle(42, 1, now).unwrap();
        session.user_toggle(42, 1, now).unwrap();
        assert_eq!(*played.lock().unwrap(), vec![42]);

        session.play();
        session.user_toggle(38, 1, now).unwrap();
        assert_eq!(played.lock().unwrap().len(), 1);
        assert!(session.should_regenerate());
    }

    #[test]
    fn test_tick_plays_active_voices() {
        let played = Arc::new(Mutex::new(Vec::new()));
        let (mut session, _, now) =
            session_with(SessionConfig::default(), Box::new(Recorder(played.clone())));
        session.user_toggle(36, 3, now).unwrap();
        session.user_toggle(42, 3, now).unwrap();
        played.lock().unwrap().clear();

        session.on_clock_tick(tick(3, now));
        assert!(played.lock().unwrap().is_empty());

        session.play();
        session.on_clock_tick(tick(3, now));
        assert_eq!(*played.lock().unwrap(), vec![36, 42]);
        assert_eq!(session.grid().active_column(), Some(3));
    }

    #[test]
    fn test_bpm_clamped() {
        let (mut session, _, _) = session();
        assert_eq!(session.set_bpm(300.0), 160.0);
        assert_eq!(session.set_bpm(20.0), 80.0);
        assert_eq!(session.set_bpm(120.0), 120.0);
    }

    #[test]
    fn test_schedule_switches_play_mode() {
        let config = SessionConfig {
            generation_mode: GenerationMode::None,
            ..SessionConfig::default()
        };
        let (mut session, handle, now) = session_with(config, Box::new(SilentTrigger));
        session.bridge_mut().connect(now).unwrap();
        session.poll(now);
        handle.clear_sent();

        session.play();
        for _ in 0..8 {
            session.on_clock_tick(tick(0, now));
        }
        let sent = handle.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].addr, "/wek5/outputs");
        assert_eq!(sent[0].args, vec![OscType::Int(PlayMode::FillerOnly as i32)]);
    }

    #[test]
    fn test_generation_not_initialized() {
        struct Unready;
        impl crate::generation::PatternGenerator for Unready {
            fn initialize(&mut self) -> Result<(), GeneratorError> {
                Err(GeneratorError::NotConfigured)
            }
            fn continue_sequence(
                &mut self,
                _: &Pattern,
                _: usize,
                _: f64,
            ) -> Result<Continuation, GeneratorError> {
                Err(GeneratorError::NotConfigured)
            }
        }

        let (channel, _) = MemoryChannel::new();
        let transport = TransportController::new(TransportManager::shared(Box::new(NullClock)));
        let now = Instant::now();
        let mut session = PlaybackSession::new(
            SessionConfig::default(),
            transport,
            BridgeClient::new(channel),
            Box::new(InlineBackend::new(Box::new(Unready))),
            Box::new(SilentTrigger),
            now,
        )
        .unwrap();

        assert!(matches!(
            session.request_generation(now),
            Err(SessionError::NotInitialized)
        ));
    }

    #[test]
    fn test_random_generation_is_single_flight() {
        let (mut session, _, now) = session();
        session.generate_random(now).unwrap();
        assert!(session.generation_in_flight());
        assert!(matches!(
            session.generate_random(now),
            Err(SessionError::GenerationInFlight)
        ));

        session.poll(now + Duration::from_secs(1));
        assert!(!session.generation_in_flight());
    }
}
