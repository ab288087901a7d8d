//! capture_image handler

use super::{to_map, HandlerContext, Reply};
use crate::capture::CaptureOptions;
use crate::error::Result;
use serde_json::{Map, Value};
use tracing::info;

/// Handle capture_image: validate options, capture, upload
pub async fn handle_capture_image(ctx: &HandlerContext, payload: &Map<String, Value>) -> Result<Reply> {
    let options = CaptureOptions::from_payload(payload)?;
    info!("  [CAPTURE_IMAGE] {} options={:?}", ctx.device_id, options);

    let report = ctx.pipeline.capture(&options).await?;

    Ok(Reply {
        message: "Image captured and uploaded successfully".into(),
        data: to_map(&report),
    })
}
