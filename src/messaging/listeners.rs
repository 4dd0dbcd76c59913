// Listeners - Typed subscriber registry
// Each component owns one registry keyed by its own event kinds

use std::collections::HashMap;
use std::hash::Hash;

/// Handle returned by `subscribe`, used to unsubscribe later
pub type SubscriptionId = u64;

/// An event that can be routed to subscribers by kind
pub trait Event {
    type Kind: Copy + Eq + Hash;

    fn kind(&self) -> Self::Kind;
}

type Callback<E> = Box<dyn FnMut(&E) + Send>;

/// Ordered list of subscribers per event kind
///
/// Subscribers of one kind are called in registration order. A subscriber may
/// be called any number of times over the registry's lifetime.
pub struct Listeners<E: Event> {
    next_id: SubscriptionId,
    by_kind: HashMap<E::Kind, Vec<(SubscriptionId, Callback<E>)>>,
}

impl<E: Event> Listeners<E> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            by_kind: HashMap::new(),
        }
    }

    /// Register a callback for one event kind
    pub fn subscribe<F>(&mut self, kind: E::Kind, callback: F) -> SubscriptionId
    where
        F: FnMut(&E) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.by_kind
            .entry(kind)
            .or_default()
            .push((id, Box::new(callback)));
        id
    }

    /// Remove a subscription. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        for subscribers in self.by_kind.values_mut() {
            if let Some(index) = subscribers.iter().position(|(sub_id, _)| *sub_id == id) {
                drop(subscribers.remove(index));
                return true;
            }
        }
        false
    }

    /// Deliver an event to every subscriber of its kind
    pub fn emit(&mut self, event: &E) {
        if let Some(subscribers) = self.by_kind.get_mut(&event.kind()) {
            for (_, callback) in subscribers.iter_mut() {
                callback(event);
            }
        }
    }

    /// Number of subscribers registered for a kind
    pub fn count(&self, kind: E::Kind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }
}

impl<E: Event> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum PingKind {
        Ping,
        Pong,
    }

    struct Ping(PingKind, u32);

    impl Event for Ping {
        type Kind = PingKind;

        fn kind(&self) -> PingKind {
            self.0
        }
    }

    #[test]
    fn test_emit_routes_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();

        let sink = Arc::clone(&seen);
        listeners.subscribe(PingKind::Ping, move |e: &Ping| sink.lock().unwrap().push(e.1));

        listeners.emit(&Ping(PingKind::Ping, 1));
        listeners.emit(&Ping(PingKind::Pong, 2));
        listeners.emit(&Ping(PingKind::Ping, 3));

        assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_subscribers_called_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();

        for tag in ["a", "b", "c"] {
            let sink = Arc::clone(&seen);
            listeners.subscribe(PingKind::Ping, move |_: &Ping| sink.lock().unwrap().push(tag));
        }
        listeners.emit(&Ping(PingKind::Ping, 0));

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut listeners = Listeners::new();

        let sink = Arc::clone(&count);
        let id = listeners.subscribe(PingKind::Pong, move |_: &Ping| *sink.lock().unwrap() += 1);
        assert_eq!(listeners.count(PingKind::Pong), 1);

        listeners.emit(&Ping(PingKind::Pong, 0));
        assert!(listeners.unsubscribe(id));
        assert!(!listeners.unsubscribe(id));
        listeners.emit(&Ping(PingKind::Pong, 0));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(listeners.count(PingKind::Pong), 0);
        // the removed callback, and its captured clone, are gone
        assert_eq!(Arc::strong_count(&count), 1);
    }
}
