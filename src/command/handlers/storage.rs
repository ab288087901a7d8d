//! test_storage handler

use super::{to_map, HandlerContext, Reply};
use crate::error::Result;
use serde_json::{Map, Value};

/// Handle test_storage by reading the container's properties
pub async fn handle_test_storage(ctx: &HandlerContext, _payload: &Map<String, Value>) -> Result<Reply> {
    let info = ctx.prober.probe().await?;

    Ok(Reply::new("Storage connection successful").with("storage_info", to_map(&info)))
}
