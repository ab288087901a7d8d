//! Shared view of whether the control channel is up

use super::ConnectionEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connected flag read by the heartbeat and the shutdown path.
///
/// [`ConnectionState::apply`] is the only writer.
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    connected: Arc<AtomicBool>,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Fold a connection event into the flag. Returns true when it changed.
    pub fn apply(&self, event: &ConnectionEvent) -> bool {
        let connected = match event {
            ConnectionEvent::Connected { .. } => true,
            ConnectionEvent::Disconnected { .. } | ConnectionEvent::ConnectionFailed { .. } => false,
            ConnectionEvent::Received(_) => return false,
        };
        self.connected.swap(connected, Ordering::SeqCst) != connected
    }
}
