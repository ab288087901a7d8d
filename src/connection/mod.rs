//! Connection management for the hub control channel
//!
//! This module handles:
//! - A persistent connection with automatic reconnection
//! - Framed bidirectional messaging through a single writer
//! - The shared connected flag

mod manager;
mod state;

pub(crate) use manager::Outbound;
pub use manager::{ConnectionConfig, ConnectionEvent, ConnectionManager, OutboundSender};
pub use state::ConnectionState;
