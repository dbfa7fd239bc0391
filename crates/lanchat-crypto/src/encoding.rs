//! URL-safe base64 encoding used for every binary field on the wire.
//!
//! Encoding never emits padding. Decoding accepts input with or without
//! trailing `=` so that clients using either convention interoperate.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use lanchat_types::{LanChatError, Result};

/// URL-safe alphabet, unpadded output, padding-indifferent input.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes `bytes` as unpadded URL-safe base64.
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_LENIENT.encode(bytes)
}

/// Decodes URL-safe base64, padded or not.
///
/// # Errors
///
/// Returns [`LanChatError::DecodeError`] on characters outside the
/// URL-safe alphabet or an impossible length.
pub fn b64url_decode(encoded: &str) -> Result<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(encoded)
        .map_err(|e| LanChatError::DecodeError {
            reason: format!("invalid base64url input: {e}"),
        })
}
