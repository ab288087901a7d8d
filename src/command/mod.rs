//! Command dispatch for the device
//!
//! This module handles:
//! - Routing method invocations by exact name
//! - Running each handler in isolation
//! - Mapping every outcome to exactly one response

mod executor;
pub mod handlers;

pub use executor::CommandExecutor;
pub use handlers::HandlerContext;
