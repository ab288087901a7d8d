use crate::connection::OutboundSender;
use camera_agent_shared::{Payload, TelemetryEvent};
use tracing::{debug, warn};

/// Best-effort telemetry writer.
///
/// Never blocks the caller: if the outbound queue is full or closed the
/// event is dropped with a warning.
#[derive(Debug, Clone)]
pub struct TelemetryEmitter {
    sender: OutboundSender,
}

impl TelemetryEmitter {
    pub fn new(sender: OutboundSender) -> Self {
        Self { sender }
    }

    /// Returns whether the event was queued
    pub fn emit(&self, event: TelemetryEvent) -> bool {
        let name = event.event.clone();
        match self.sender.try_send(Payload::telemetry(event)) {
            Ok(()) => {
                debug!("[TELEMETRY] Queued {}", name);
                true
            }
            Err(e) => {
                warn!("[TELEMETRY] Dropped {}: {}", name, e);
                false
            }
        }
    }
}
