//! Device side of the control channel
//!
//! Folds connection events into the shared state, answers method requests
//! and emits the lifecycle telemetry.

use crate::capture::CapturePipeline;
use crate::command::CommandExecutor;
use crate::connection::{ConnectionEvent, ConnectionState, OutboundSender};
use crate::error::AgentError;
use crate::telemetry::TelemetryEmitter;
use camera_agent_shared::{Envelope, Invocation, InvocationResult, Payload, Response, TelemetryEvent};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct Agent {
    executor: CommandExecutor,
    pipeline: CapturePipeline,
    sender: OutboundSender,
    telemetry: TelemetryEmitter,
    state: ConnectionState,
    announced: bool,
}

impl Agent {
    pub fn new(
        executor: CommandExecutor,
        pipeline: CapturePipeline,
        sender: OutboundSender,
        state: ConnectionState,
    ) -> Self {
        Self {
            executor,
            pipeline,
            telemetry: TelemetryEmitter::new(sender.clone()),
            sender,
            state,
            announced: false,
        }
    }

    /// Handle one connection event. Returns the task spawned for it, if any.
    pub fn handle_event(&mut self, event: ConnectionEvent) -> Option<JoinHandle<()>> {
        self.state.apply(&event);

        match event {
            ConnectionEvent::Connected { remote } => {
                info!("Connected to {}", remote);
                if self.announced {
                    return None;
                }
                self.announced = true;

                let pipeline = self.pipeline.clone();
                let telemetry = self.telemetry.clone();
                Some(tokio::spawn(async move {
                    let camera_available = pipeline.check_camera().await;
                    telemetry.emit(TelemetryEvent::device_started(camera_available));
                }))
            }
            ConnectionEvent::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                None
            }
            ConnectionEvent::ConnectionFailed { reason } => {
                error!("Connection failed: {}", reason);
                None
            }
            ConnectionEvent::Received(envelope) => self.handle_hub_message(envelope),
        }
    }

    /// Queue `device_stopped` if the channel is up. Returns whether it was queued.
    pub fn announce_stop(&self) -> bool {
        self.state.is_connected() && self.telemetry.emit(TelemetryEvent::device_stopped())
    }

    /// Each request runs in its own task so a slow capture never delays
    /// other requests or the heartbeat.
    fn handle_hub_message(&self, envelope: Envelope) -> Option<JoinHandle<()>> {
        debug!("Received from hub: seq={}", envelope.header.sequence_id);

        match envelope.payload {
            Payload::MethodRequest {
                request_id,
                invocation,
            } => {
                let executor = self.executor.clone();
                let sender = self.sender.clone();
                Some(tokio::spawn(async move {
                    let response = match Invocation::from_value(invocation) {
                        Ok(invocation) => executor.execute(invocation).await,
                        Err(e) => {
                            let err = AgentError::InvalidPayload(e.to_string());
                            warn!("Request {} rejected: {}", request_id, err);
                            Response::from_result(InvocationResult::error(err.to_string()))
                        }
                    };

                    if let Err(e) = sender
                        .send(Payload::MethodResponse {
                            request_id,
                            response,
                        })
                        .await
                    {
                        error!("Failed to send response: {}", e);
                    }
                }))
            }
            other => {
                debug!("  Unhandled payload: {:?}", other);
                None
            }
        }
    }
}
