// Status de la connexion au bridge

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Error = 3,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Error,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Wrapper atomique, lisible depuis d'autres threads
#[derive(Debug, Clone)]
pub struct AtomicConnectionState {
    inner: Arc<AtomicU8>,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(state as u8)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from(self.inner.load(Ordering::Relaxed))
    }

    /// Retourne l'état précédent
    pub fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from(self.inner.swap(state as u8, Ordering::Relaxed))
    }
}

impl Default for AtomicConnectionState {
    fn default() -> Self {
        Self::new(ConnectionState::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_u8() {
        assert_eq!(ConnectionState::from(2), ConnectionState::Connected);
        assert_eq!(ConnectionState::from(42), ConnectionState::Disconnected);
    }

    #[test]
    fn test_shared_state() {
        let state = AtomicConnectionState::default();
        let reader = state.clone();

        assert_eq!(state.set(ConnectionState::Connecting), ConnectionState::Disconnected);
        state.set(ConnectionState::Connected);
        assert!(reader.get().is_connected());
    }
}
