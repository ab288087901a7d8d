//! Error types for the camera agent

use crate::process::ProcessError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors a handler or the startup path can produce
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or malformed configuration; fatal at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// Camera probe or capture failed
    #[error("{0}")]
    HardwareUnavailable(String),

    /// Capture program reported success but left no usable file
    #[error("{0}")]
    ArtifactIntegrity(String),

    /// A system-information command failed or printed something unparseable
    #[error("system information unavailable: {0}")]
    SystemInfo(String),

    /// Object storage unreachable, unauthorized or rejected the request
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Method '{0}' not supported")]
    UnsupportedCommand(String),

    /// Payload field failed validation before any process was launched
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// External program could not be launched or timed out
    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub type Result<T> = std::result::Result<T, AgentError>;
