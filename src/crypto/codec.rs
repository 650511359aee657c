//! Hex and base64 decoding of textual vault fields.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::EncodingError;

/// Decode a hex string (either case). Empty input yields an empty buffer.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(hex::decode(s)?)
}

/// Decode a padded standard-alphabet base64 string.
pub fn decode_base64(s: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(STANDARD.decode(s)?)
}
