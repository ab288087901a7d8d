//! Length-prefixed codec for TCP framing
//!
//! All messages are framed as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: UTF-8 JSON Envelope ]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::Envelope;

/// Maximum message size (10 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

const PREFIX_LEN: usize = 4;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes (max: {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("Invalid message length prefix: {0}")]
    InvalidLength(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Encode an Envelope into a length-prefixed byte buffer
pub fn encode(envelope: &Envelope) -> Result<Bytes, CodecError> {
    let body = serde_json::to_vec(envelope)?;

    if body.len() > MAX_MESSAGE_SIZE as usize {
        return Err(CodecError::MessageTooLarge(body.len()));
    }

    let mut buf = BytesMut::with_capacity(PREFIX_LEN + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);

    Ok(buf.freeze())
}

/// Try to decode a length-prefixed Envelope from a buffer
///
/// Returns:
/// - `Ok(Some(envelope))` if a complete message was decoded
/// - `Ok(None)` if more data is needed
/// - `Err(...)` if the data is invalid
pub fn decode(buf: &mut BytesMut) -> Result<Option<Envelope>, CodecError> {
    if buf.len() < PREFIX_LEN {
        return Ok(None);
    }

    // Peek at the length prefix without consuming
    let msg_len = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);

    if msg_len > MAX_MESSAGE_SIZE {
        return Err(CodecError::InvalidLength(msg_len));
    }

    let total_len = PREFIX_LEN + msg_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(PREFIX_LEN);
    let msg_bytes = buf.split_to(msg_len as usize);

    Ok(Some(serde_json::from_slice(&msg_bytes)?))
}

/// Decoder state machine for streaming decoding
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Create a new frame decoder
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next frame from the buffer
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<Envelope>, CodecError> {
        decode(&mut self.buffer)
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Header, Invocation, Payload, Response, InvocationResult};

    fn request_envelope() -> Envelope {
        Envelope {
            header: Header::new("hub", 7),
            payload: Payload::method_request("req-1", Invocation::new("ping")),
        }
    }

    #[test]
    fn test_length_prefix_matches_body() {
        let encoded = encode(&request_envelope()).expect("encode failed");
        let len_prefix = u32::from_be_bytes([encoded[0], encoded[1], encoded[2], encoded[3]]);
        assert_eq!(len_prefix as usize, encoded.len() - 4);
    }

    #[test]
    fn test_partial_decode() {
        let encoded = encode(&request_envelope()).expect("encode failed");

        let mut buf = BytesMut::from(&encoded[..5]);
        let result = decode(&mut buf).expect("decode should not fail on partial data");
        assert!(result.is_none(), "should return None for partial data");

        // Buffer should be unchanged (data not consumed)
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn test_frame_decoder_across_chunks() {
        let original = request_envelope();
        let encoded = encode(&original).expect("encode failed");

        let mut decoder = FrameDecoder::new();
        decoder.extend(&encoded[..3]);
        assert!(decoder.decode_next().expect("decode error").is_none());

        decoder.extend(&encoded[3..]);
        let decoded = decoder
            .decode_next()
            .expect("decode error")
            .expect("should have message");

        assert_eq!(decoded, original);
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_multiple_frames() {
        let response = Envelope {
            header: Header::new("cam-001", 8),
            payload: Payload::MethodResponse {
                request_id: "req-1".into(),
                response: Response::from_result(InvocationResult::error("camera not available")),
            },
        };

        let mut decoder = FrameDecoder::new();
        decoder.extend(&encode(&request_envelope()).unwrap());
        decoder.extend(&encode(&response).unwrap());

        assert!(matches!(
            decoder.decode_next().unwrap().map(|e| e.payload),
            Some(Payload::MethodRequest { .. })
        ));
        assert!(matches!(
            decoder.decode_next().unwrap().map(|e| e.payload),
            Some(Payload::MethodResponse { .. })
        ));
        assert!(decoder.decode_next().unwrap().is_none());
    }

    #[test]
    fn test_malformed_invocation_still_decodes() {
        let body = br#"{"header":{"device_id":"hub","sequence_id":3,"timestamp_ms":1},"payload":{"type":"method_request","request_id":"r9","invocation":{"name":"ping","payload":"x"}}}"#;
        let mut buf = BytesMut::new();
        buf.put_u32(body.len() as u32);
        buf.extend_from_slice(body);

        let envelope = decode(&mut buf).unwrap().expect("complete frame");
        assert!(matches!(
            envelope.payload,
            Payload::MethodRequest { ref request_id, .. } if request_id == "r9"
        ));
    }

    #[test]
    fn test_message_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_MESSAGE_SIZE + 1);
        buf.put_bytes(0, 100);

        let result = decode(&mut buf);
        assert!(matches!(result, Err(CodecError::InvalidLength(_))));
    }

    #[test]
    fn test_garbage_body_is_json_error() {
        let mut buf = BytesMut::new();
        buf.put_u32(3);
        buf.extend_from_slice(b"{x}");

        assert!(matches!(decode(&mut buf), Err(CodecError::Json(_))));
    }
}
