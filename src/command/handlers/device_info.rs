//! get_device_info handler

use super::{to_map, HandlerContext, Reply};
use crate::error::Result;
use serde_json::{Map, Value};

/// Handle get_device_info. Payload is ignored.
pub async fn handle_get_device_info(ctx: &HandlerContext, _payload: &Map<String, Value>) -> Result<Reply> {
    let info = ctx.inspector.inspect().await?;

    Ok(Reply::new("Device information retrieved").with("device_info", to_map(&info)))
}
