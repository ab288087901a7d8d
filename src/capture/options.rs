//! Optional capture parameters carried in the invocation payload
//!
//! Both fields are validated before the camera is touched so a bad payload
//! never costs a capture attempt.

use crate::error::{AgentError, Result};
use serde_json::{Map, Value};

/// Image effects accepted by the capture program's `-ifx` flag
pub const IMAGE_EFFECTS: &[&str] = &[
    "none",
    "negative",
    "solarise",
    "sketch",
    "denoise",
    "emboss",
    "oilpaint",
    "hatch",
    "gpen",
    "pastel",
    "watercolour",
    "film",
    "blur",
    "saturation",
    "colourswap",
    "washedout",
    "posterise",
    "colourpoint",
    "colourbalance",
    "cartoon",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Degrees, `0..360`
    pub rotation: Option<u16>,
    pub effect: Option<String>,
}

impl CaptureOptions {
    /// Read `rotation` and `effect` from a payload. Absent or null fields stay unset.
    pub fn from_payload(payload: &Map<String, Value>) -> Result<Self> {
        let rotation = match payload.get("rotation") {
            None | Some(Value::Null) => None,
            Some(value) => Some(parse_rotation(value)?),
        };

        let effect = match payload.get("effect") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if IMAGE_EFFECTS.contains(&name.as_str()) => Some(name.clone()),
            Some(Value::String(name)) => {
                return Err(AgentError::InvalidPayload(format!("unknown effect '{}'", name)));
            }
            Some(other) => {
                return Err(AgentError::InvalidPayload(format!(
                    "effect must be a string, got {}",
                    other
                )));
            }
        };

        Ok(Self { rotation, effect })
    }

    /// Arguments appended after the base capture arguments
    pub fn extra_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(rotation) = self.rotation {
            args.push("-rot".to_string());
            args.push(rotation.to_string());
        }
        if let Some(effect) = &self.effect {
            args.push("-ifx".to_string());
            args.push(effect.clone());
        }
        args
    }
}

fn parse_rotation(value: &Value) -> Result<u16> {
    let invalid = || {
        AgentError::InvalidPayload(format!(
            "rotation must be a whole number of degrees in 0..360, got {}",
            value
        ))
    };

    let degrees = match value {
        Value::Number(n) => match (n.as_u64(), n.as_f64()) {
            (Some(whole), _) => whole,
            (None, Some(f)) if f.fract() == 0.0 && f >= 0.0 => f as u64,
            _ => return Err(invalid()),
        },
        _ => return Err(invalid()),
    };

    if degrees >= 360 {
        return Err(invalid());
    }
    Ok(degrees as u16)
}
