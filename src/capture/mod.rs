//! Camera capture pipeline
//!
//! This module handles:
//! - Probing camera availability
//! - Validating capture options from the invocation payload
//! - Running the capture program and verifying its output
//! - Handing the artifact to the uploader

mod options;
mod pipeline;

pub use options::CaptureOptions;
pub use pipeline::{CapturePipeline, CaptureSettings};
