// Bridge channel - Transport carrying OSC messages to and from the player

use super::protocol;
use super::{BridgeError, BridgeResult};
use rosc::OscMessage;
use std::collections::VecDeque;
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex, PoisonError};

/// Something that happened on the channel since the last poll
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Disconnected,
    Message(OscMessage),
}

/// Bidirectional message channel used by the bridge client
pub trait BridgeChannel: Send {
    /// Establish the channel. Success means the client may send.
    fn open(&mut self) -> BridgeResult<()>;

    fn send(&mut self, message: &OscMessage) -> BridgeResult<()>;

    /// Non-blocking; `None` when nothing is pending
    fn poll(&mut self) -> Option<ChannelEvent>;

    fn close(&mut self);
}

/// OSC over UDP
///
/// Messages are sent to `remote`; feedback is received on `local`.
pub struct UdpChannel {
    local: SocketAddr,
    remote: SocketAddr,
    socket: Option<UdpSocket>,
    pending: VecDeque<ChannelEvent>,
    buf: Vec<u8>,
}

impl UdpChannel {
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            local,
            remote,
            socket: None,
            pending: VecDeque::new(),
            buf: vec![0; rosc::decoder::MTU],
        }
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}

impl BridgeChannel for UdpChannel {
    fn open(&mut self) -> BridgeResult<()> {
        if self.socket.is_some() {
            return Ok(());
        }
        let socket = UdpSocket::bind(self.local)?;
        socket.set_nonblocking(true)?;
        log::info!("Bridge listening on {}, sending to {}", self.local, self.remote);
        self.socket = Some(socket);
        Ok(())
    }

    fn send(&mut self, message: &OscMessage) -> BridgeResult<()> {
        let socket = self.socket.as_ref().ok_or(BridgeError::NotConnected)?;
        let bytes = protocol::encode(message)?;
        socket.send_to(&bytes, self.remote)?;
        Ok(())
    }

    fn poll(&mut self) -> Option<ChannelEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        let socket = self.socket.as_ref()?;
        match socket.recv_from(&mut self.buf) {
            Ok((size, _from)) => {
                match protocol::decode(&self.buf[..size]) {
                    Ok(messages) => {
                        self.pending
                            .extend(messages.into_iter().map(ChannelEvent::Message));
                    }
                    Err(e) => log::warn!("Dropping undecodable datagram: {}", e),
                }
                self.pending.pop_front()
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                log::error!("Bridge socket error: {}", e);
                self.socket = None;
                Some(ChannelEvent::Disconnected)
            }
        }
    }

    fn close(&mut self) {
        self.socket = None;
        self.pending.clear();
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    open: bool,
    refuse: bool,
    sent: Vec<OscMessage>,
    inbound: VecDeque<ChannelEvent>,
}

/// In-process channel; the paired `MemoryHandle` plays the remote side
pub struct MemoryChannel {
    state: Arc<Mutex<MemoryState>>,
}

/// Remote end of a `MemoryChannel`
#[derive(Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryChannel {
    pub fn new() -> (Self, MemoryHandle) {
        let state = Arc::new(Mutex::new(MemoryState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MemoryHandle { state },
        )
    }
}

impl BridgeChannel for MemoryChannel {
    fn open(&mut self) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.refuse {
            return Err(BridgeError::Io(std::io::Error::from(
                ErrorKind::ConnectionRefused,
            )));
        }
        state.open = true;
        Ok(())
    }

    fn send(&mut self, message: &OscMessage) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.open {
            return Err(BridgeError::NotConnected);
        }
        state.sent.push(message.clone());
        Ok(())
    }

    fn poll(&mut self) -> Option<ChannelEvent> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let event = state.inbound.pop_front()?;
        if event == ChannelEvent::Disconnected {
            state.open = false;
        }
        Some(event)
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.open = false;
    }
}

impl MemoryHandle {
    /// Messages sent so far, oldest first
    pub fn sent(&self) -> Vec<OscMessage> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }

    pub fn clear_sent(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clear();
    }

    /// Queue a message from the remote side
    pub fn push_inbound(&self, message: OscMessage) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .inbound
            .push_back(ChannelEvent::Message(message));
    }

    /// Simulate the remote side going away
    pub fn drop_connection(&self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .inbound
            .push_back(ChannelEvent::Disconnected);
    }

    /// Make subsequent `open` calls fail
    pub fn set_refuse(&self, refuse: bool) {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).refuse = refuse;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).open
    }
}
