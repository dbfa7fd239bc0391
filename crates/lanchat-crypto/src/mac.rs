//! HMAC-SHA256 message authentication codes.
//!
//! Clients authenticate the serialized message envelope with the HMAC
//! key derived during key agreement. The relay forwards the tag without
//! being able to verify it.

use hmac::{Hmac, Mac};
use lanchat_types::{CryptoFailureKind, LanChatError, Result};
use sha2::Sha256;

use crate::encoding::{b64url_decode, b64url_encode};

/// HMAC-SHA256 type alias.
type HmacSha256 = Hmac<Sha256>;

/// Fixed output length of HMAC-SHA256 in bytes.
pub const HMAC_SHA256_LEN: usize = 32;

/// Computes HMAC-SHA256 over `data` using `key`.
///
/// # Errors
///
/// Returns [`LanChatError::CryptoFailure`] if HMAC initialisation fails
/// (does not happen with SHA-256, but we avoid `unwrap`).
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HMAC_SHA256_LEN]> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| {
        LanChatError::crypto(
            CryptoFailureKind::Internal,
            format!("HMAC-SHA256 key init failed: {e}"),
        )
    })?;
    mac.update(data);
    let result = mac.finalize().into_bytes();

    let mut output = [0u8; HMAC_SHA256_LEN];
    output.copy_from_slice(&result);
    Ok(output)
}

/// Verifies an HMAC-SHA256 tag in constant time.
///
/// # Errors
///
/// Returns [`LanChatError::CryptoFailure`] with kind
/// [`CryptoFailureKind::AuthenticationFailure`] if the tag does not match.
pub fn verify_hmac_sha256(key: &[u8], data: &[u8], expected: &[u8]) -> Result<()> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| {
        LanChatError::crypto(
            CryptoFailureKind::Internal,
            format!("HMAC-SHA256 key init failed: {e}"),
        )
    })?;
    mac.update(data);

    mac.verify_slice(expected).map_err(|_| {
        LanChatError::crypto(
            CryptoFailureKind::AuthenticationFailure,
            "HMAC-SHA256 verification failed: tag mismatch",
        )
    })
}

/// Computes HMAC-SHA256 and returns it base64url-encoded (wire format).
pub fn compute_hmac_b64(key: &[u8], data: &[u8]) -> Result<String> {
    Ok(b64url_encode(&hmac_sha256(key, data)?))
}

/// Verifies a base64url-encoded HMAC-SHA256 tag.
///
/// Returns `false` for malformed base64 as well as for a mismatching tag.
pub fn verify_hmac_b64(key: &[u8], data: &[u8], expected_b64: &str) -> bool {
    match b64url_decode(expected_b64) {
        Ok(tag) => verify_hmac_sha256(key, data, &tag).is_ok(),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
