// Transport - Shared playback clock with single-owner semantics
// Several controllers may exist, only one drives the clock at a time

use crate::messaging::listeners::{Event, Listeners, SubscriptionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The playback clock shared by all controllers
pub trait Clock: Send {
    /// One-time process-wide initialisation, called before the first start
    fn bootstrap(&mut self) {}

    fn start(&mut self);

    fn stop(&mut self);

    fn set_bpm(&mut self, bpm: f64);
}

/// Identifies one controller registered with the manager
pub type ControllerId = u32;

/// Ownership state of the shared clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Idle,
    Running(ControllerId),
}

impl TransportState {
    pub fn is_running(&self) -> bool {
        matches!(self, TransportState::Running(_))
    }

    /// Current owner, if any
    pub fn owner(&self) -> Option<ControllerId> {
        match self {
            TransportState::Running(id) => Some(*id),
            TransportState::Idle => None,
        }
    }
}

/// Start/stop notifications delivered to a controller's subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportEvent {
    Started,
    Stopped,
}

impl Event for TransportEvent {
    type Kind = TransportEvent;

    fn kind(&self) -> TransportEvent {
        *self
    }
}

/// Explicit state machine owning the shared clock
pub struct TransportManager {
    clock: Box<dyn Clock>,
    bootstrapped: bool,
    state: TransportState,
    bpm: f64,
    next_id: ControllerId,
    listeners: HashMap<ControllerId, Listeners<TransportEvent>>,
}

pub type SharedTransport = Arc<Mutex<TransportManager>>;

impl TransportManager {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            bootstrapped: false,
            state: TransportState::Idle,
            bpm: 120.0,
            next_id: 1,
            listeners: HashMap::new(),
        }
    }

    /// Wrap a manager for sharing between controllers
    pub fn shared(clock: Box<dyn Clock>) -> SharedTransport {
        Arc::new(Mutex::new(Self::new(clock)))
    }

    /// Allocate an id for a new controller
    pub fn register(&mut self) -> ControllerId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, Listeners::new());
        id
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn is_running(&self, controller: ControllerId) -> bool {
        self.state == TransportState::Running(controller)
    }

    /// Make `controller` the owner and start the clock
    ///
    /// A running owner is stopped (and notified) first. No-op if `controller`
    /// already owns the clock.
    pub fn request_start(&mut self, controller: ControllerId, bpm: f64) {
        if self.is_running(controller) {
            return;
        }

        if let TransportState::Running(previous) = self.state {
            self.request_stop(previous);
        }

        self.state = TransportState::Running(controller);
        self.notify(controller, TransportEvent::Started);
        self.set_bpm(bpm);

        if !self.bootstrapped {
            self.clock.bootstrap();
            self.bootstrapped = true;
        }
        self.clock.start();
        log::debug!("Transport started by controller {} at {} BPM", controller, bpm);
    }

    /// Stop the clock if `controller` owns it
    pub fn request_stop(&mut self, controller: ControllerId) {
        if !self.is_running(controller) {
            return;
        }
        self.state = TransportState::Idle;
        self.notify(controller, TransportEvent::Stopped);
        self.clock.stop();
        log::debug!("Transport stopped by controller {}", controller);
    }

    /// Update the clock rate, whoever owns it
    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
        self.clock.set_bpm(bpm);
    }

    pub fn subscribe<F>(
        &mut self,
        controller: ControllerId,
        kind: TransportEvent,
        callback: F,
    ) -> SubscriptionId
    where
        F: FnMut(&TransportEvent) + Send + 'static,
    {
        self.listeners
            .entry(controller)
            .or_default()
            .subscribe(kind, callback)
    }

    pub fn unsubscribe(&mut self, controller: ControllerId, id: SubscriptionId) -> bool {
        self.listeners
            .get_mut(&controller)
            .is_some_and(|listeners| listeners.unsubscribe(id))
    }

    fn notify(&mut self, controller: ControllerId, event: TransportEvent) {
        if let Some(listeners) = self.listeners.get_mut(&controller) {
            listeners.emit(&event);
        }
    }
}

/// Handle a sequencer uses to drive the shared transport
///
/// Subscribers run while the manager is locked and must not call back into
/// the transport; forward the event to a queue instead.
#[derive(Clone)]
pub struct TransportController {
    id: ControllerId,
    transport: SharedTransport,
}

impl TransportController {
    pub fn new(transport: SharedTransport) -> Self {
        let id = lock(&transport).register();
        Self { id, transport }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn start(&self, bpm: f64) {
        lock(&self.transport).request_start(self.id, bpm);
    }

    pub fn stop(&self) {
        lock(&self.transport).request_stop(self.id);
    }

    pub fn set_bpm(&self, bpm: f64) {
        lock(&self.transport).set_bpm(bpm);
    }

    pub fn is_running(&self) -> bool {
        lock(&self.transport).is_running(self.id)
    }

    pub fn on_event<F>(&self, kind: TransportEvent, callback: F) -> SubscriptionId
    where
        F: FnMut(&TransportEvent) + Send + 'static,
    {
        lock(&self.transport).subscribe(self.id, kind, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.transport).unsubscribe(self.id, id)
    }
}

fn lock(transport: &SharedTransport) -> MutexGuard<'_, TransportManager> {
    transport.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LogClock(Arc<Mutex<Vec<String>>>);

    impl Clock for LogClock {
        fn bootstrap(&mut self) {
            self.0.lock().unwrap().push("bootstrap".into());
        }
        fn start(&mut self) {
            self.0.lock().unwrap().push("start".into());
        }
        fn stop(&mut self) {
            self.0.lock().unwrap().push("stop".into());
        }
        fn set_bpm(&mut self, bpm: f64) {
            self.0.lock().unwrap().push(format!("bpm {}", bpm));
        }
    }

    fn transport() -> (SharedTransport, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (TransportManager::shared(Box::new(LogClock(Arc::clone(&log)))), log)
    }

    #[test]
    fn test_transport_state_default() {
        let state = TransportState::default();
        assert_eq!(state, TransportState::Idle);
        assert!(!state.is_running());
        assert_eq!(TransportState::Running(3).owner(), Some(3));
    }

    #[test]
    fn test_start_and_stop() {
        let (shared, log) = transport();
        let drums = TransportController::new(Arc::clone(&shared));

        drums.start(100.0);
        assert!(drums.is_running());
        drums.start(100.0);
        drums.stop();
        assert!(!drums.is_running());

        assert_eq!(
            *log.lock().unwrap(),
            vec!["bpm 100", "bootstrap", "start", "stop"]
        );
    }

    #[test]
    fn test_stop_by_non_owner_is_ignored() {
        let (shared, _log) = transport();
        let drums = TransportController::new(Arc::clone(&shared));
        let bass = TransportController::new(Arc::clone(&shared));

        drums.start(90.0);
        bass.stop();
        assert!(drums.is_running());
        assert_eq!(lock(&shared).state(), TransportState::Running(drums.id()));
    }

    #[test]
    fn test_set_bpm_without_ownership() {
        let (shared, log) = transport();
        let bass = TransportController::new(Arc::clone(&shared));

        bass.set_bpm(140.0);
        assert_eq!(lock(&shared).bpm(), 140.0);
        assert_eq!(*log.lock().unwrap(), vec!["bpm 140"]);
    }

    #[test]
    fn test_bootstrap_runs_once() {
        let (shared, log) = transport();
        let drums = TransportController::new(Arc::clone(&shared));

        drums.start(100.0);
        drums.stop();
        drums.start(100.0);

        let count = log
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| *entry == "bootstrap")
            .count();
        assert_eq!(count, 1);
    }
}
