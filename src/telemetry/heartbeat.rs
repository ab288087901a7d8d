use super::TelemetryEmitter;
use crate::connection::ConnectionState;
use camera_agent_shared::TelemetryEvent;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Periodic liveness event, sent only while the channel is up
pub struct Heartbeat;

impl Heartbeat {
    /// Start the heartbeat loop. The first beat is one full period after
    /// start; the loop exits as soon as `shutdown` changes or its sender
    /// is dropped.
    pub fn spawn(
        emitter: TelemetryEmitter,
        state: ConnectionState,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if state.is_connected() {
                            emitter.emit(TelemetryEvent::heartbeat());
                        } else {
                            debug!("[HEARTBEAT] Skipped, not connected");
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[HEARTBEAT] Stopped");
                        return;
                    }
                }
            }
        })
    }
}
