//! Device telemetry
//!
//! Lifecycle events and the periodic heartbeat, all written through the
//! shared outbound channel.

mod emitter;
mod heartbeat;

pub use emitter::TelemetryEmitter;
pub use heartbeat::Heartbeat;
