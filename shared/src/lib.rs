//! Camera Agent Shared Protocol Types
//!
//! This crate provides the wire types and codec for the control channel
//! between a camera device agent and the hub that drives it.

pub mod codec;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Fixed operating parameters of the device
pub mod limits {
    /// Interval between heartbeat telemetry events
    pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

    /// Camera availability probe timeout
    pub const CAMERA_PROBE_TIMEOUT_SECS: u64 = 10;

    /// Maximum run time of a single capture
    pub const CAPTURE_TIMEOUT_SECS: u64 = 30;

    /// Timeout applied to each system-information command
    pub const SYSTEM_INFO_TIMEOUT_SECS: u64 = 10;

    /// Pre-capture delay handed to the capture program
    pub const CAPTURE_DELAY_MS: u64 = 2000;

    pub const IMAGE_WIDTH: u32 = 1024;
    pub const IMAGE_HEIGHT: u32 = 768;
    pub const IMAGE_QUALITY: u32 = 85;

    /// Object storage container receiving captures
    pub const CONTAINER_NAME: &str = "camera-images";
}

/// Response status codes
pub mod status_code {
    pub const OK: u16 = 200;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;
}

/// A framed message on the control channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub payload: Payload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub device_id: String,
    pub sequence_id: u64,
    pub timestamp_ms: u64,
}

impl Header {
    /// Create a new header stamped with the current time
    pub fn new(device_id: impl Into<String>, sequence_id: u64) -> Self {
        Self {
            device_id: device_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    /// First frame written by the device after connecting
    Hello { agent_version: String },
    /// Named remote invocation from the hub.
    ///
    /// The invocation stays raw JSON here so a malformed one still yields a
    /// readable `request_id` to answer; see [`Invocation::from_value`].
    MethodRequest {
        request_id: String,
        #[serde(default)]
        invocation: Value,
    },
    /// The single response to a `MethodRequest`
    MethodResponse {
        request_id: String,
        response: Response,
    },
    /// One-way telemetry message
    Telemetry {
        content_type: String,
        content_encoding: String,
        event: TelemetryEvent,
    },
}

impl Payload {
    pub fn method_request(request_id: impl Into<String>, invocation: Invocation) -> Self {
        let mut raw = Map::new();
        raw.insert("name".into(), Value::String(invocation.name));
        raw.insert("payload".into(), Value::Object(invocation.payload));
        Payload::MethodRequest {
            request_id: request_id.into(),
            invocation: Value::Object(raw),
        }
    }

    /// Wrap a telemetry event with its JSON content metadata
    pub fn telemetry(event: TelemetryEvent) -> Self {
        Payload::Telemetry {
            content_type: "application/json".into(),
            content_encoding: "utf-8".into(),
            event,
        }
    }
}

/// Remote methods understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    CaptureImage,
    GetDeviceInfo,
    TestStorage,
    Ping,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::CaptureImage,
        Method::GetDeviceInfo,
        Method::TestStorage,
        Method::Ping,
    ];

    /// Exact, case-sensitive match on the invocation name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::CaptureImage => "capture_image",
            Method::GetDeviceInfo => "get_device_info",
            Method::TestStorage => "test_storage",
            Method::Ping => "ping",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub payload: Map<String, Value>,
}

impl Invocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: Map::new(),
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    /// Parse the raw invocation of a `method_request`. Fails when `name` is
    /// missing or not a string, or `payload` is neither an object nor null.
    pub fn from_value(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Outcome of one handler; serialized flat with `data` merged at top level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub status: ResultStatus,
    pub message: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl InvocationResult {
    pub fn success(message: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            status: ResultStatus::Success,
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    pub body: InvocationResult,
}

impl Response {
    /// Map a result to its status code: success is 200, any handled error 500
    pub fn from_result(body: InvocationResult) -> Self {
        let status_code = if body.is_success() {
            status_code::OK
        } else {
            status_code::INTERNAL_ERROR
        };
        Self { status_code, body }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self {
            status_code: status_code::INTERNAL_ERROR,
            body: InvocationResult::error(message),
        }
    }

    pub fn not_found(method_name: &str) -> Self {
        Self {
            status_code: status_code::NOT_FOUND,
            body: InvocationResult::error(format!("Method '{}' not supported", method_name)),
        }
    }
}

/// Fire-and-forget telemetry event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TelemetryEvent {
    pub const DEVICE_STARTED: &'static str = "device_started";
    pub const HEARTBEAT: &'static str = "heartbeat";
    pub const IMAGE_CAPTURED: &'static str = "image_captured";
    pub const DEVICE_STOPPED: &'static str = "device_stopped";

    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            timestamp: Utc::now(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn device_started(camera_available: bool) -> Self {
        Self::new(Self::DEVICE_STARTED).with_field("camera_available", camera_available)
    }

    pub fn heartbeat() -> Self {
        Self::new(Self::HEARTBEAT)
    }

    pub fn image_captured(filename: &str, size_bytes: u64) -> Self {
        Self::new(Self::IMAGE_CAPTURED)
            .with_field("filename", filename)
            .with_field("size_bytes", size_bytes)
    }

    pub fn device_stopped() -> Self {
        Self::new(Self::DEVICE_STOPPED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_creation() {
        let header = Header::new("cam-001", 1);
        assert_eq!(header.device_id, "cam-001");
        assert_eq!(header.sequence_id, 1);
        assert!(header.timestamp_ms > 0);
    }

    #[test]
    fn test_method_names_are_exact() {
        assert_eq!(Method::from_name("capture_image"), Some(Method::CaptureImage));
        assert_eq!(Method::from_name("ping"), Some(Method::Ping));
        assert_eq!(Method::from_name("Ping"), None);
        assert_eq!(Method::from_name(" ping"), None);
        assert_eq!(Method::from_name("reboot"), None);
    }

    #[test]
    fn test_null_payload_is_empty() {
        let inv: Invocation =
            serde_json::from_value(json!({"name": "ping", "payload": null})).unwrap();
        assert!(inv.payload.is_empty());

        let inv: Invocation = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert!(inv.payload.is_empty());
    }

    #[test]
    fn test_method_request_keeps_malformed_invocation() {
        let payload: Payload = serde_json::from_value(json!({
            "type": "method_request",
            "request_id": "r9",
            "invocation": {"name": "ping", "payload": "x"}
        }))
        .unwrap();

        let Payload::MethodRequest {
            request_id,
            invocation,
        } = payload
        else {
            panic!("expected method_request");
        };
        assert_eq!(request_id, "r9");

        let err = Invocation::from_value(invocation).unwrap_err();
        assert!(err.to_string().contains("invalid type"));
    }

    #[test]
    fn test_invocation_from_value() {
        assert!(Invocation::from_value(json!({"payload": {}})).is_err());
        assert!(Invocation::from_value(json!({"name": "ping", "payload": [1]})).is_err());

        let inv = Invocation::from_value(json!({"name": "capture_image", "payload": {"rotation": 90}}))
            .unwrap();
        assert_eq!(inv.name, "capture_image");
        assert_eq!(inv.payload["rotation"], 90);
    }

    #[test]
    fn test_method_request_builder_round_trips_invocation() {
        let mut payload = Map::new();
        payload.insert("effect".into(), json!("sketch"));
        let invocation = Invocation::with_payload("capture_image", payload);

        match Payload::method_request("r1", invocation.clone()) {
            Payload::MethodRequest {
                request_id,
                invocation: raw,
            } => {
                assert_eq!(request_id, "r1");
                assert_eq!(Invocation::from_value(raw).unwrap(), invocation);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_result_serializes_flat() {
        let mut data = Map::new();
        data.insert("filename".into(), json!("a.jpg"));
        let response = Response::from_result(InvocationResult::success("ok", data));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["status_code"], 200);
        assert_eq!(value["body"]["status"], "success");
        assert_eq!(value["body"]["filename"], "a.jpg");
    }

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(Response::from_result(InvocationResult::error("x")).status_code, 500);
        assert_eq!(Response::not_found("reboot").status_code, 404);
        assert!(Response::not_found("reboot").body.message.contains("reboot"));
    }

    #[test]
    fn test_telemetry_fields_flattened() {
        let event = TelemetryEvent::image_captured("a.jpg", 42);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "image_captured");
        assert_eq!(value["filename"], "a.jpg");
        assert_eq!(value["size_bytes"], 42);
        assert!(value["timestamp"].is_string());
    }
}
