// Bridge client - Connection state, outbound patterns and inbound beat feedback

use super::channel::{BridgeChannel, ChannelEvent};
use super::protocol::{self, Inbound, PatternType, PlayMode};
use super::BridgeResult;
use crate::connection::status::{AtomicConnectionState, ConnectionState};
use crate::messaging::listeners::{Event, Listeners, SubscriptionId};
use crate::sequencer::Voice;
use crate::sequencer::pattern::WirePattern;
use rosc::OscMessage;
use std::time::{Duration, Instant};

/// Delay between a successful connect and the bootstrap messages
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Connection(bool),
    Beat { step: i32, pattern_type: PatternType },
    Message(OscMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeEventKind {
    Connection,
    Beat,
    Message,
}

impl Event for BridgeEvent {
    type Kind = BridgeEventKind;

    fn kind(&self) -> BridgeEventKind {
        match self {
            BridgeEvent::Connection(_) => BridgeEventKind::Connection,
            BridgeEvent::Beat { .. } => BridgeEventKind::Beat,
            BridgeEvent::Message(_) => BridgeEventKind::Message,
        }
    }
}

/// Client side of the bridge protocol
///
/// Delivery is at-most-once: sends while disconnected return false and are
/// dropped, nothing is queued or retried.
pub struct BridgeClient<C: BridgeChannel> {
    channel: C,
    state: AtomicConnectionState,
    listeners: Listeners<BridgeEvent>,
    settle_delay: Duration,
    bootstrap_at: Option<Instant>,
    /// Connection changes not yet returned by `poll`
    pending: Vec<BridgeEvent>,
}

impl<C: BridgeChannel> BridgeClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            state: AtomicConnectionState::default(),
            listeners: Listeners::new(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            bootstrap_at: None,
            pending: Vec::new(),
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Shared view of the connection state for other threads
    pub fn state_handle(&self) -> AtomicConnectionState {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state.get().is_connected()
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Open the channel; on success the bootstrap follows after the settle delay
    pub fn connect(&mut self, now: Instant) -> BridgeResult<()> {
        if self.is_connected() {
            return Ok(());
        }

        self.state.set(ConnectionState::Connecting);
        match self.channel.open() {
            Ok(()) => {
                self.state.set(ConnectionState::Connected);
                log::info!("Bridge connected");
                self.listeners.emit(&BridgeEvent::Connection(true));
                self.pending.push(BridgeEvent::Connection(true));
                self.bootstrap_at = Some(now + self.settle_delay);
                Ok(())
            }
            Err(e) => {
                self.state.set(ConnectionState::Error);
                log::error!("Bridge connection failed: {}", e);
                Err(e)
            }
        }
    }

    pub fn disconnect(&mut self) {
        self.channel.close();
        self.mark_disconnected();
    }

    fn mark_disconnected(&mut self) {
        self.bootstrap_at = None;
        let previous = self.state.set(ConnectionState::Disconnected);
        if previous.is_connected() {
            log::warn!("Bridge disconnected");
            self.listeners.emit(&BridgeEvent::Connection(false));
            self.pending.push(BridgeEvent::Connection(false));
        }
    }

    /// Drain the channel, dispatch inbound events and run a due bootstrap
    ///
    /// Returns every event dispatched to subscribers since the last call,
    /// including connection changes made by `connect` and `disconnect`.
    pub fn poll(&mut self, now: Instant) -> Vec<BridgeEvent> {
        let mut events = std::mem::take(&mut self.pending);

        while let Some(channel_event) = self.channel.poll() {
            match channel_event {
                ChannelEvent::Disconnected => {
                    self.mark_disconnected();
                    events.append(&mut self.pending);
                }
                ChannelEvent::Message(message) => {
                    let event = match protocol::parse_inbound(message) {
                        Inbound::Beat { step, pattern_type } => {
                            BridgeEvent::Beat { step, pattern_type }
                        }
                        Inbound::Other(message) => BridgeEvent::Message(message),
                    };
                    self.listeners.emit(&event);
                    events.push(event);
                }
            }
        }

        if self.bootstrap_at.is_some_and(|at| now >= at) {
            self.bootstrap_at = None;
            self.bootstrap();
        }

        events
    }

    fn bootstrap(&mut self) {
        log::debug!("Bridge bootstrap");
        self.set_kit(0);
        self.send_pattern(&[], &[], false);
        self.set_play_mode(PlayMode::OriginalOnly);
    }

    /// Send one message. Returns false if it was not sent.
    pub fn send(&mut self, message: &OscMessage) -> bool {
        if !self.is_connected() {
            log::warn!("Bridge not connected, dropping {}", message.addr);
            return false;
        }
        match self.channel.send(message) {
            Ok(()) => {
                log::debug!("-> {} {:?}", message.addr, message.args);
                true
            }
            Err(e) => {
                log::error!("Failed to send {}: {}", message.addr, e);
                false
            }
        }
    }

    /// Send a pattern as its notes and steps messages
    pub fn send_pattern(&mut self, notes: &[Voice], steps: &[usize], is_filler: bool) -> bool {
        if !self.is_connected() {
            log::warn!(
                "Bridge not connected, skipping {} pattern",
                if is_filler { "filler" } else { "original" }
            );
            return false;
        }
        let [notes_msg, steps_msg] = protocol::pattern_messages(notes, steps, is_filler);
        self.send(&notes_msg) && self.send(&steps_msg)
    }

    pub fn send_wire(&mut self, pattern: &WirePattern, is_filler: bool) -> bool {
        self.send_pattern(&pattern.notes, &pattern.steps, is_filler)
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) -> bool {
        self.send(&protocol::play_mode_message(mode))
    }

    pub fn set_kit(&mut self, index: i32) -> bool {
        self.send(&protocol::kit_message(index))
    }

    /// Subscribe to connection changes; called at once if already connected
    pub fn on_connect<F>(&mut self, mut callback: F) -> SubscriptionId
    where
        F: FnMut(&BridgeEvent) + Send + 'static,
    {
        if self.is_connected() {
            callback(&BridgeEvent::Connection(true));
        }
        self.listeners.subscribe(BridgeEventKind::Connection, callback)
    }

    pub fn on_beat<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&BridgeEvent) + Send + 'static,
    {
        self.listeners.subscribe(BridgeEventKind::Beat, callback)
    }

    pub fn on_message<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&BridgeEvent) + Send + 'static,
    {
        self.listeners.subscribe(BridgeEventKind::Message, callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::MemoryChannel;
    use rosc::OscType;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_send_while_disconnected() {
        let (channel, handle) = MemoryChannel::new();
        let mut client = BridgeClient::new(channel);

        assert!(!client.send_pattern(&[36], &[0], false));
        assert!(!client.set_play_mode(PlayMode::Both));
        assert!(handle.sent().is_empty());
    }

    #[test]
    fn test_bootstrap_after_settle() {
        let (channel, handle) = MemoryChannel::new();
        let mut client = BridgeClient::new(channel);
        let t0 = Instant::now();

        client.connect(t0).unwrap();
        assert_eq!(client.state(), ConnectionState::Connected);
        client.poll(t0 + Duration::from_millis(50));
        assert!(handle.sent().is_empty());

        client.poll(t0 + Duration::from_millis(100));
        let addrs: Vec<String> = handle.sent().into_iter().map(|m| m.addr).collect();
        assert_eq!(
            addrs,
            vec!["/wek6/outputs", "/wek/outputs", "/wek2/outputs", "/wek5/outputs"]
        );
        assert_eq!(handle.sent()[3].args, vec![OscType::Int(1)]);

        // only once
        client.poll(t0 + Duration::from_secs(1));
        assert_eq!(handle.sent().len(), 4);
    }

    #[test]
    fn test_on_connect_called_immediately() {
        let (channel, _handle) = MemoryChannel::new();
        let mut client = BridgeClient::new(channel);
        client.connect(Instant::now()).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.on_connect(move |e| sink.lock().unwrap().push(e.clone()));
        client.disconnect();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![BridgeEvent::Connection(true), BridgeEvent::Connection(false)]
        );
    }

    #[test]
    fn test_connection_changes_returned_by_poll() {
        let (channel, _handle) = MemoryChannel::new();
        let mut client = BridgeClient::new(channel);
        let t0 = Instant::now();

        client.connect(t0).unwrap();
        assert_eq!(client.poll(t0), vec![BridgeEvent::Connection(true)]);
        assert!(client.poll(t0).is_empty());

        client.disconnect();
        assert_eq!(client.poll(t0), vec![BridgeEvent::Connection(false)]);
        assert!(client.poll(t0).is_empty());
    }

    #[test]
    fn test_refused_connection() {
        let (channel, handle) = MemoryChannel::new();
        handle.set_refuse(true);
        let mut client = BridgeClient::new(channel);

        assert!(client.connect(Instant::now()).is_err());
        assert_eq!(client.state(), ConnectionState::Error);
        assert!(!client.set_kit(0));
    }

    #[test]
    fn test_inbound_dispatch() {
        let (channel, handle) = MemoryChannel::new();
        let mut client = BridgeClient::new(channel);
        client.connect(Instant::now()).unwrap();

        let beats = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&beats);
        client.on_beat(move |_| *sink.lock().unwrap() += 1);

        handle.push_inbound(OscMessage {
            addr: "/druminfo".into(),
            args: vec![OscType::Int(3), OscType::Int(0)],
        });
        handle.push_inbound(OscMessage {
            addr: "/hello".into(),
            args: vec![],
        });

        let events = client.poll(Instant::now());
        assert_eq!(events[0], BridgeEvent::Connection(true));
        assert_eq!(
            events[1],
            BridgeEvent::Beat {
                step: 3,
                pattern_type: PatternType::Original
            }
        );
        assert!(matches!(&events[2], BridgeEvent::Message(m) if m.addr == "/hello"));
        assert_eq!(*beats.lock().unwrap(), 1);
    }
}
