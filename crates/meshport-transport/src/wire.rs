//! Wire codec for the identity exchange
//!
//! The companion protocol is treated as opaque beyond one exchange: a
//! query frame out, a structured reply (or error event) back. Frames
//! are a fixed 4-byte header followed by a CBOR body:
//!
//! ```text
//! byte 0: op
//! byte 1: flags (bit 0 = error event)
//! bytes 2-3: body length, big-endian
//! ```

use meshport_core::{DeviceIdentity, IdentityReply};

use crate::error::{Result, TransportError};

/// Frame header length in bytes
pub const HEADER_LEN: usize = 4;

/// Largest body we accept before declaring the frame invalid
pub const MAX_BODY_LEN: usize = 4096;

/// Device identity query
pub const OP_IDENTITY_REQ: u8 = 0x01;
/// Reply to an identity query
pub const OP_IDENTITY_RSP: u8 = 0x81;

/// Flag bit marking the body as an error event instead of a payload
pub const FLAG_ERROR_EVENT: u8 = 0x01;

/// Encode a frame header
pub fn encode_header(op: u8, flags: u8, body_len: u16) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = op;
    header[1] = flags;
    header[2] = (body_len >> 8) as u8;
    header[3] = body_len as u8;
    header
}

/// Decode a frame header: (op, flags, body length)
pub fn decode_header(data: &[u8]) -> Option<(u8, u8, u16)> {
    if data.len() < HEADER_LEN {
        return None;
    }
    let op = data[0];
    let flags = data[1];
    let body_len = ((data[2] as u16) << 8) | (data[3] as u16);
    Some((op, flags, body_len))
}

/// Build the complete identity query frame (empty CBOR map body)
pub fn encode_identity_query() -> Result<Vec<u8>> {
    let body = serde_cbor::to_vec(&std::collections::BTreeMap::<String, String>::new())
        .map_err(|e| TransportError::Frame(e.to_string()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&encode_header(OP_IDENTITY_REQ, 0, body.len() as u16));
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a complete reply frame into an `IdentityReply`
pub fn decode_identity_reply(frame: &[u8]) -> Result<IdentityReply> {
    let (op, flags, body_len) = decode_header(frame)
        .ok_or_else(|| TransportError::Frame("frame shorter than header".to_string()))?;

    if op != OP_IDENTITY_RSP {
        return Err(TransportError::Frame(format!(
            "unexpected op 0x{:02x} in reply",
            op
        )));
    }

    let body_end = HEADER_LEN + body_len as usize;
    if frame.len() < body_end {
        return Err(TransportError::Frame(format!(
            "body truncated: header says {} bytes, got {}",
            body_len,
            frame.len() - HEADER_LEN
        )));
    }

    if flags & FLAG_ERROR_EVENT != 0 {
        return Ok(IdentityReply::error_event());
    }

    let identity: DeviceIdentity = serde_cbor::from_slice(&frame[HEADER_LEN..body_end])
        .map_err(|e| TransportError::Frame(format!("bad identity body: {}", e)))?;

    Ok(IdentityReply::ok(identity))
}

/// Build a reply frame from an identity payload. Probing never sends
/// replies; this exists for loopback tests and mock devices.
pub fn encode_identity_reply(reply: &IdentityReply) -> Result<Vec<u8>> {
    let (flags, body) = if reply.error {
        (
            FLAG_ERROR_EVENT,
            serde_cbor::to_vec(&std::collections::BTreeMap::<String, String>::new())
                .map_err(|e| TransportError::Frame(e.to_string()))?,
        )
    } else {
        (
            0,
            serde_cbor::to_vec(&reply.identity)
                .map_err(|e| TransportError::Frame(e.to_string()))?,
        )
    };
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.extend_from_slice(&encode_header(OP_IDENTITY_RSP, flags, body.len() as u16));
    frame.extend_from_slice(&body);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_encoding() {
        let header = encode_header(OP_IDENTITY_REQ, 0, 300);
        assert_eq!(header[0], 0x01);
        assert_eq!(header[1], 0);
        // length 300 big-endian
        assert_eq!(header[2], 0x01);
        assert_eq!(header[3], 0x2c);

        let (op, flags, len) = decode_header(&header).unwrap();
        assert_eq!(op, OP_IDENTITY_REQ);
        assert_eq!(flags, 0);
        assert_eq!(len, 300);
    }

    #[test]
    fn test_short_header_rejected() {
        assert!(decode_header(&[0x01, 0x00]).is_none());
    }

    #[test]
    fn test_reply_roundtrip() {
        let reply = IdentityReply::ok(DeviceIdentity {
            model: Some("RAK4631".to_string()),
            name: Some("ridge-node".to_string()),
            firmware_version: Some("v1.5.1".to_string()),
            public_key: None,
        });
        let frame = encode_identity_reply(&reply).unwrap();
        let decoded = decode_identity_reply(&frame).unwrap();
        assert_eq!(decoded, reply);
        assert!(decoded.is_valid());
    }

    #[test]
    fn test_error_event_decodes_as_error() {
        let frame = encode_identity_reply(&IdentityReply::error_event()).unwrap();
        let decoded = decode_identity_reply(&frame).unwrap();
        assert!(decoded.error);
        assert!(!decoded.is_valid());
    }

    #[test]
    fn test_truncated_body_rejected() {
        let mut frame = encode_identity_reply(&IdentityReply::ok(DeviceIdentity {
            model: Some("T-Beam".to_string()),
            ..Default::default()
        }))
        .unwrap();
        frame.truncate(frame.len() - 2);
        assert!(matches!(
            decode_identity_reply(&frame),
            Err(TransportError::Frame(_))
        ));
    }

    #[test]
    fn test_wrong_op_rejected() {
        let mut frame = encode_identity_reply(&IdentityReply::error_event()).unwrap();
        frame[0] = 0x7f;
        assert!(matches!(
            decode_identity_reply(&frame),
            Err(TransportError::Frame(_))
        ));
    }
}
