//! ping handler

use super::{HandlerContext, Reply};
use crate::error::Result;
use chrono::Utc;
use serde_json::{Map, Value};

/// Liveness check; touches neither camera nor storage
pub async fn handle_ping(_ctx: &HandlerContext, _payload: &Map<String, Value>) -> Result<Reply> {
    Ok(Reply::new("pong").with("timestamp", Utc::now().to_rfc3339()))
}
