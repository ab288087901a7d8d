//! Probe, capture, verify, upload

use super::options::CaptureOptions;
use crate::error::{AgentError, Result};
use crate::process::{ProcessError, ProcessRunner};
use crate::storage::StorageUploader;
use crate::telemetry::TelemetryEmitter;
use camera_agent_shared::{limits, TelemetryEvent};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempPath;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Fixed parameters of the capture program invocation
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub program: String,
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub quality: u32,
    pub delay: Duration,
    pub probe_timeout: Duration,
    pub capture_timeout: Duration,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            program: "raspistill".into(),
            output_dir: PathBuf::from("/tmp"),
            width: limits::IMAGE_WIDTH,
            height: limits::IMAGE_HEIGHT,
            quality: limits::IMAGE_QUALITY,
            delay: Duration::from_millis(limits::CAPTURE_DELAY_MS),
            probe_timeout: Duration::from_secs(limits::CAMERA_PROBE_TIMEOUT_SECS),
            capture_timeout: Duration::from_secs(limits::CAPTURE_TIMEOUT_SECS),
        }
    }
}

/// Successful capture as reported back to the caller
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub filename: String,
    pub blob_url: String,
    pub size_bytes: u64,
    pub timestamp: DateTime<Utc>,
}

/// Unique object name: second-resolution timestamp plus 8 random hex chars
pub fn remote_name(at: DateTime<Utc>) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("analyzed_capture_{}_{}.jpg", at.format("%Y%m%d_%H%M%S"), &id[..8])
}

#[derive(Clone)]
pub struct CapturePipeline {
    runner: Arc<dyn ProcessRunner>,
    uploader: StorageUploader,
    telemetry: TelemetryEmitter,
    settings: CaptureSettings,
}

impl CapturePipeline {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        uploader: StorageUploader,
        telemetry: TelemetryEmitter,
        settings: CaptureSettings,
    ) -> Self {
        Self {
            runner,
            uploader,
            telemetry,
            settings,
        }
    }

    /// Quick throwaway capture to confirm the camera responds
    pub async fn check_camera(&self) -> bool {
        let args = to_args(&["-t", "1", "-o", "/dev/null"]);

        match self
            .runner
            .run(&self.settings.program, &args, self.settings.probe_timeout)
            .await
        {
            Ok(output) if output.success() => {
                info!("[CAPTURE] Camera check passed");
                true
            }
            Ok(output) => {
                error!("[CAPTURE] Camera check failed: {}", output.error_text());
                false
            }
            Err(e) => {
                error!("[CAPTURE] Camera check error: {}", e);
                false
            }
        }
    }

    /// Run one capture attempt end to end. No retries.
    pub async fn capture(&self, options: &CaptureOptions) -> Result<CaptureReport> {
        info!("[CAPTURE] Starting image capture with options: {:?}", options);

        if !self.check_camera().await {
            return Err(AgentError::HardwareUnavailable("camera not available".into()));
        }

        let filename = remote_name(Utc::now());
        let path = self.settings.output_dir.join(&filename);
        // Removes whatever the capture program leaves behind on every early return
        let local = TempPath::from_path(&path);

        info!("[CAPTURE] Capturing image: {}", filename);
        let mut args = self.base_args(&path);
        args.extend(options.extra_args());

        let output = self
            .runner
            .run(&self.settings.program, &args, self.settings.capture_timeout)
            .await
            .map_err(|e| match e {
                ProcessError::Timeout { .. } => {
                    AgentError::HardwareUnavailable("Image capture timed out".into())
                }
                other => AgentError::HardwareUnavailable(format!("Image capture failed: {}", other)),
            })?;

        if !output.success() {
            return Err(AgentError::HardwareUnavailable(format!(
                "Image capture failed: {}",
                output.error_text()
            )));
        }

        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            Ok(_) => return Err(AgentError::ArtifactIntegrity("Image file is empty".into())),
            Err(_) => return Err(AgentError::ArtifactIntegrity("Image file was not created".into())),
        };
        info!("[CAPTURE] Image captured successfully: {} bytes", size_bytes);

        let blob_url = self.uploader.upload(local, &filename).await.map_err(|e| {
            warn!("[CAPTURE] Upload of {} failed: {}", filename, e);
            AgentError::Storage(e)
        })?;

        self.telemetry
            .emit(TelemetryEvent::image_captured(&filename, size_bytes));

        Ok(CaptureReport {
            filename,
            blob_url,
            size_bytes,
            timestamp: Utc::now(),
        })
    }

    fn base_args(&self, path: &std::path::Path) -> Vec<String> {
        let s = &self.settings;
        vec![
            "-o".into(),
            path.display().to_string(),
            "-w".into(),
            s.width.to_string(),
            "-h".into(),
            s.height.to_string(),
            "-q".into(),
            s.quality.to_string(),
            "-t".into(),
            s.delay.as_millis().to_string(),
            "--nopreview".into(),
        ]
    }
}

fn to_args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
