//! # Wire Codec
//!
//! Binary framing for envelopes crossing a transport. A frame is one version
//! byte followed by the bincode encoding of the envelope.

use thiserror::Error;

use crate::envelope::UpdateEnvelope;

/// Current frame version.
pub const WIRE_VERSION: u8 = 1;

/// Envelopes carry metadata only, so frames stay small.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Empty frame")]
    Empty,

    #[error("Unsupported wire version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u8, supported: u8 },

    #[error("Frame too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Malformed frame: {0}")]
    Malformed(String),
}

pub fn encode_envelope(envelope: &UpdateEnvelope) -> Result<Vec<u8>, WireError> {
    let body = bincode::serialize(envelope).map_err(|e| WireError::Malformed(e.to_string()))?;
    if body.len() + 1 > MAX_FRAME_BYTES {
        return Err(WireError::TooLarge {
            size: body.len() + 1,
            max: MAX_FRAME_BYTES,
        });
    }
    let mut frame = Vec::with_capacity(body.len() + 1);
    frame.push(WIRE_VERSION);
    frame.extend_from_slice(&body);
    Ok(frame)
}

pub fn decode_envelope(frame: &[u8]) -> Result<UpdateEnvelope, WireError> {
    let (&version, body) = frame.split_first().ok_or(WireError::Empty)?;
    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion {
            received: version,
            supported: WIRE_VERSION,
        });
    }
    if frame.len() > MAX_FRAME_BYTES {
        return Err(WireError::TooLarge {
            size: frame.len(),
            max: MAX_FRAME_BYTES,
        });
    }
    bincode::deserialize(body).map_err(|e| WireError::Malformed(e.to_string()))
}
