//! Startup configuration
//!
//! Only the two connection secrets come from the environment; everything
//! else the agent does is fixed by the constants in `camera_agent_shared::limits`.

use crate::error::{AgentError, Result};
use crate::storage::StorageAccount;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;

pub const DEVICE_CONNECTION_STRING_VAR: &str = "DEVICE_CONNECTION_STRING";
pub const STORAGE_CONNECTION_STRING_VAR: &str = "STORAGE_CONNECTION_STRING";

/// Hub port used when `HostName` carries none
pub const DEFAULT_HUB_PORT: u16 = 8080;

/// Split `Key=Value;Key=Value` into a map. Values keep any further `=`.
pub fn parse_connection_string(raw: &str) -> Result<HashMap<String, String>> {
    let mut fields = HashMap::new();

    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part.split_once('=').ok_or_else(|| {
            AgentError::Config(format!("malformed connection string segment without '=': {}", redact_key(part)))
        })?;
        fields.insert(key.trim().to_string(), value.trim().to_string());
    }

    if fields.is_empty() {
        return Err(AgentError::Config("connection string is empty".into()));
    }

    Ok(fields)
}

// Keep the key name only, a bare segment may be a secret
fn redact_key(segment: &str) -> String {
    format!("{}...", segment.chars().take(4).collect::<String>())
}

/// Where the control channel connects and who the device is
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConnection {
    /// `host:port` of the hub
    pub hub_address: String,
    pub device_id: String,
}

impl DeviceConnection {
    /// Parse `HostName=<host[:port]>;DeviceId=<id>[;SharedAccessKey=..]`
    pub fn from_connection_string(raw: &str) -> Result<Self> {
        let fields = parse_connection_string(raw)?;

        let host = required(&fields, "HostName")?;
        let device_id = required(&fields, "DeviceId")?;

        let hub_address = if host.contains(':') {
            host.to_string()
        } else {
            format!("{}:{}", host, DEFAULT_HUB_PORT)
        };

        Ok(Self {
            hub_address,
            device_id: device_id.to_string(),
        })
    }
}

fn required<'a>(fields: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AgentError::Config(format!("device connection string has no {}", key)))
}

/// Fully validated agent configuration
#[derive(Debug)]
pub struct AgentConfig {
    pub device: DeviceConnection,
    pub storage: StorageAccount,
}

impl AgentConfig {
    /// Validate both secrets; a missing or malformed one aborts startup
    pub fn from_secrets(
        device_connection_string: Option<SecretString>,
        storage_connection_string: Option<SecretString>,
    ) -> Result<Self> {
        let device = device_connection_string
            .ok_or_else(|| missing(DEVICE_CONNECTION_STRING_VAR))?;
        let storage = storage_connection_string
            .ok_or_else(|| missing(STORAGE_CONNECTION_STRING_VAR))?;

        Ok(Self {
            device: DeviceConnection::from_connection_string(device.expose_secret())?,
            storage: StorageAccount::from_connection_string(storage.expose_secret())?,
        })
    }
}

fn missing(var: &str) -> AgentError {
    AgentError::Config(format!("{} environment variable not set", var))
}
