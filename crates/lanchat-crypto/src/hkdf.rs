//! HKDF-SHA256 (RFC 5869).
//!
//! Expands the raw P-256 shared secret into session keys. Chat key
//! agreement always derives without a salt, so `salt` is optional and
//! `None` selects the all-zero salt of hash length.

use hkdf::Hkdf;
use lanchat_types::{CryptoFailureKind, LanChatError, Result};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Largest output this crate will derive: one AES-256 key plus one
/// HMAC-SHA256 key.
pub const MAX_OUTPUT_LEN: usize = 64;

/// Key material derived by [`hkdf_sha256`]. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct HkdfOutput {
    bytes: Vec<u8>,
}

impl HkdfOutput {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copies out the 32-byte block starting at `offset`.
    ///
    /// Returns `None` if fewer than 32 bytes remain.
    pub fn block32(&self, offset: usize) -> Option<[u8; 32]> {
        let end = offset.checked_add(32)?;
        let mut out = [0u8; 32];
        out.copy_from_slice(self.bytes.get(offset..end)?);
        Some(out)
    }
}

// HkdfOutput does not implement Clone/Debug to prevent leakage.

/// Extracts from `ikm` (with optional `salt`) and expands to
/// `output_len` bytes bound to `info`.
///
/// # Errors
///
/// [`CryptoFailureKind::Internal`] if `output_len` is outside
/// `1..=MAX_OUTPUT_LEN`.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    output_len: usize,
) -> Result<HkdfOutput> {
    if output_len == 0 || output_len > MAX_OUTPUT_LEN {
        return Err(LanChatError::crypto(
            CryptoFailureKind::Internal,
            format!("HKDF output length {output_len} outside 1..={MAX_OUTPUT_LEN}"),
        ));
    }

    let mut bytes = vec![0u8; output_len];
    Hkdf::<Sha256>::new(salt, ikm)
        .expand(info, &mut bytes)
        .map_err(|e| LanChatError::crypto(CryptoFailureKind::Internal, e.to_string()))?;

    Ok(HkdfOutput { bytes })
}
