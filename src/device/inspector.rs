//! Device inspector
//!
//! Gathers hostname, uptime, root filesystem usage and SoC temperature, each
//! through its own external command. Temperature is the only fact allowed to
//! be missing.

use crate::error::{AgentError, Result};
use crate::process::ProcessRunner;
use camera_agent_shared::limits;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Firmware tool reporting the SoC temperature on Raspberry Pi boards
pub const THERMAL_PROGRAM: &str = "/opt/vc/bin/vcgencmd";

pub const UNKNOWN_TEMPERATURE: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub hostname: String,
    pub uptime: String,
    pub disk_used: String,
    pub disk_available: String,
    pub disk_usage_percent: String,
    pub temperature: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DiskUsage {
    used: String,
    available: String,
    percent: String,
}

#[derive(Clone)]
pub struct DeviceInspector {
    runner: Arc<dyn ProcessRunner>,
    thermal_program: String,
    timeout: Duration,
}

impl DeviceInspector {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            thermal_program: THERMAL_PROGRAM.to_string(),
            timeout: Duration::from_secs(limits::SYSTEM_INFO_TIMEOUT_SECS),
        }
    }

    pub async fn inspect(&self) -> Result<DeviceInfo> {
        let (hostname, uptime, disk, temperature) = tokio::join!(
            self.read("hostname", &[]),
            self.read("uptime", &["-p"]),
            self.read("df", &["-h", "/"]),
            self.temperature(),
        );

        // Report the first failing fact in field order
        let hostname = hostname?.trim().to_string();
        let uptime = uptime?.trim().to_string();
        let disk = parse_df(&disk?)?;

        Ok(DeviceInfo {
            hostname,
            uptime,
            disk_used: disk.used,
            disk_available: disk.available,
            disk_usage_percent: disk.percent,
            temperature,
            timestamp: Utc::now(),
        })
    }

    /// Run a command that must succeed and return its stdout
    async fn read(&self, program: &str, args: &[&str]) -> Result<String> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let output = self.runner.run(program, &args, self.timeout).await?;

        if !output.success() {
            return Err(AgentError::SystemInfo(format!(
                "{} failed: {}",
                program,
                output.error_text()
            )));
        }
        Ok(output.stdout)
    }

    async fn temperature(&self) -> String {
        let args = vec!["measure_temp".to_string()];
        match self.runner.run(&self.thermal_program, &args, self.timeout).await {
            Ok(output) if output.success() => parse_temperature(&output.stdout).unwrap_or_else(|| {
                debug!("Unrecognized temperature output: {:?}", output.stdout);
                UNKNOWN_TEMPERATURE.to_string()
            }),
            Ok(output) => {
                warn!("Temperature read failed: {}", output.error_text());
                UNKNOWN_TEMPERATURE.to_string()
            }
            Err(e) => {
                warn!("Temperature read failed: {}", e);
                UNKNOWN_TEMPERATURE.to_string()
            }
        }
    }
}

/// `temp=48.3'C` becomes `48.3°C`
fn parse_temperature(raw: &str) -> Option<String> {
    let reading = raw.trim().strip_prefix("temp=")?;
    if reading.is_empty() {
        return None;
    }
    Some(reading.replace("'C", "°C"))
}

/// Used, available and use% columns of `df -h /`. Long device names make
/// `df` wrap the row, so all lines after the header are joined first.
fn parse_df(raw: &str) -> Result<DiskUsage> {
    let columns: Vec<&str> = raw.lines().skip(1).flat_map(str::split_whitespace).collect();

    if columns.len() < 5 {
        return Err(AgentError::SystemInfo(format!(
            "unexpected df output: {:?}",
            raw.trim()
        )));
    }

    Ok(DiskUsage {
        used: columns[2].to_string(),
        available: columns[3].to_string(),
        percent: columns[4].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ProcessOutput;
    use crate::testing::{exit_fail, exit_ok, timed_out, FakeRunner};

    const DF: &str = "Filesystem      Size  Used Avail Use% Mounted on\n\
                      /dev/root        29G  4.1G   24G  15% /\n";

    fn healthy(program: &str, _args: &[String]) -> std::result::Result<ProcessOutput, crate::process::ProcessError> {
        match program {
            "hostname" => exit_ok("campi\n"),
            "uptime" => exit_ok("up 3 hours, 12 minutes\n"),
            "df" => exit_ok(DF),
            THERMAL_PROGRAM => exit_ok("temp=48.3'C\n"),
            other => panic!("unexpected program {}", other),
        }
    }

    #[tokio::test]
    async fn test_all_facts_collected() {
        let runner = Arc::new(FakeRunner::new(healthy));
        let info = DeviceInspector::new(runner.clone()).inspect().await.unwrap();

        assert_eq!(info.hostname, "campi");
        assert_eq!(info.uptime, "up 3 hours, 12 minutes");
        assert_eq!(info.disk_used, "4.1G");
        assert_eq!(info.disk_available, "24G");
        assert_eq!(info.disk_usage_percent, "15%");
        assert_eq!(info.temperature, "48.3°C");
        assert_eq!(runner.calls().len(), 4);
        assert_eq!(runner.calls_to("df"), 1);
    }

    #[tokio::test]
    async fn test_missing_thermal_sensor_degrades() {
        let runner = Arc::new(FakeRunner::new(|program, args| {
            if program == THERMAL_PROGRAM {
                exit_fail(255, "VCHI initialization failed")
            } else {
                healthy(program, args)
            }
        }));

        let info = DeviceInspector::new(runner).inspect().await.unwrap();
        assert_eq!(info.temperature, UNKNOWN_TEMPERATURE);
        assert_eq!(info.hostname, "campi");
    }

    #[tokio::test]
    async fn test_thermal_timeout_degrades() {
        let runner = Arc::new(FakeRunner::new(|program, args| {
            if program == THERMAL_PROGRAM {
                timed_out(program)
            } else {
                healthy(program, args)
            }
        }));

        let info = DeviceInspector::new(runner).inspect().await.unwrap();
        assert_eq!(info.temperature, UNKNOWN_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_hostname_failure_fails_inspection() {
        let runner = Arc::new(FakeRunner::new(|program, args| {
            if program == "hostname" {
                exit_fail(1, "boom")
            } else {
                healthy(program, args)
            }
        }));

        let err = DeviceInspector::new(runner).inspect().await.unwrap_err();
        assert!(matches!(err, AgentError::SystemInfo(ref msg) if msg.contains("hostname")));
    }

    #[tokio::test]
    async fn test_error_names_first_failing_fact() {
        let runner = Arc::new(FakeRunner::new(|program, _args| match program {
            "hostname" => exit_fail(1, "hostname broke"),
            "uptime" => exit_fail(1, "uptime broke"),
            "df" => exit_fail(1, "df broke"),
            _ => exit_ok("temp=40.0'C\n"),
        }));

        let err = DeviceInspector::new(runner).inspect().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("hostname"), "{}", message);
        assert!(!message.contains("df"), "{}", message);
    }

    #[tokio::test]
    async fn test_df_failure_reported_when_others_succeed() {
        let runner = Arc::new(FakeRunner::new(|program, args| {
            if program == "df" {
                exit_ok("Filesystem Size\n")
            } else {
                healthy(program, args)
            }
        }));

        let err = DeviceInspector::new(runner).inspect().await.unwrap_err();
        assert!(err.to_string().contains("df"));
    }

    #[tokio::test]
    async fn test_uptime_timeout_fails_inspection() {
        let runner = Arc::new(FakeRunner::new(|program, args| {
            if program == "uptime" {
                timed_out(program)
            } else {
                healthy(program, args)
            }
        }));

        let err = DeviceInspector::new(runner).inspect().await.unwrap_err();
        assert!(matches!(err, AgentError::Process(_)));
    }

    #[test]
    fn test_parse_wrapped_df() {
        let wrapped = "Filesystem                          Size  Used Avail Use% Mounted on\n\
                       /dev/mapper/very--long--volume--name\n\
                                                            58G   20G   35G  37% /\n";
        let disk = parse_df(wrapped).unwrap();
        assert_eq!(disk.used, "20G");
        assert_eq!(disk.available, "35G");
        assert_eq!(disk.percent, "37%");
    }

    #[test]
    fn test_parse_df_garbage() {
        assert!(parse_df("Filesystem Size\n").is_err());
    }

    #[test]
    fn test_parse_temperature() {
        assert_eq!(parse_temperature("temp=51.0'C\n").as_deref(), Some("51.0°C"));
        assert_eq!(parse_temperature("error=1"), None);
        assert_eq!(parse_temperature("temp="), None);
    }
}
