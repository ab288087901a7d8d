//! Command handlers for the supported methods

mod capture;
mod device_info;
mod ping;
mod storage;

pub use capture::handle_capture_image;
pub use device_info::handle_get_device_info;
pub use ping::handle_ping;
pub use storage::handle_test_storage;

use crate::capture::CapturePipeline;
use crate::device::DeviceInspector;
use crate::error::Result;
use crate::storage::StorageProber;
use camera_agent_shared::Method;
use serde::Serialize;
use serde_json::{Map, Value};

/// Services available to every handler
#[derive(Clone)]
pub struct HandlerContext {
    pub device_id: String,
    pub pipeline: CapturePipeline,
    pub inspector: DeviceInspector,
    pub prober: StorageProber,
}

/// Successful handler outcome, turned into a success result by the executor
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message: String,
    pub data: Map<String, Value>,
}

impl Reply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// Route a parsed method to its handler
pub async fn handle(method: Method, ctx: &HandlerContext, payload: &Map<String, Value>) -> Result<Reply> {
    match method {
        Method::CaptureImage => handle_capture_image(ctx, payload).await,
        Method::GetDeviceInfo => handle_get_device_info(ctx, payload).await,
        Method::TestStorage => handle_test_storage(ctx, payload).await,
        Method::Ping => handle_ping(ctx, payload).await,
    }
}

/// Plain record structs always serialize to an object
fn to_map<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}
