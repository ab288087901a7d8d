//! External process invocation
//!
//! Every call carries its own timeout; a process that outlives it is killed
//! and reported as [`ProcessError::Timeout`].

mod runner;

pub use runner::{ProcessError, ProcessOutput, ProcessRunner, SystemRunner};
