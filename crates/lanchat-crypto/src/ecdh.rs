//! Ephemeral Elliptic-Curve Diffie-Hellman over NIST P-256.
//!
//! Public keys travel as uncompressed SEC1 points (65 bytes,
//! `0x04 || X || Y`), the format browsers export from WebCrypto. Every
//! peer point is checked to lie on the curve before use.

use lanchat_types::{CryptoFailureKind, LanChatError, Result};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an uncompressed SEC1-encoded P-256 point.
pub const UNCOMPRESSED_POINT_LEN: usize = 65;

// ---------------------------------------------------------------------------
// P256PublicKey
// ---------------------------------------------------------------------------

/// Validated P-256 public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct P256PublicKey(p256::PublicKey);

impl P256PublicKey {
    /// Parses a SEC1-encoded point and checks it lies on the curve.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::CryptoFailure`] with kind
    /// [`CryptoFailureKind::InvalidPeerKey`] for malformed encodings,
    /// points off the curve and the identity.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self> {
        p256::PublicKey::from_sec1_bytes(bytes)
            .map(Self)
            .map_err(|_| {
                LanChatError::crypto(
                    CryptoFailureKind::InvalidPeerKey,
                    format!("{}-byte input is not a valid P-256 point", bytes.len()),
                )
            })
    }

    /// Returns the uncompressed SEC1 encoding (65 bytes).
    pub fn to_uncompressed_bytes(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }
}

// ---------------------------------------------------------------------------
// P256EphemeralSecret
// ---------------------------------------------------------------------------

/// Ephemeral P-256 secret scalar, generated per connection.
///
/// The underlying `p256` secret zeroizes its memory on drop.
pub struct P256EphemeralSecret(p256::ecdh::EphemeralSecret);

impl P256EphemeralSecret {
    /// Generates a fresh secret from OS entropy.
    pub fn generate() -> Self {
        Self(p256::ecdh::EphemeralSecret::random(&mut OsRng))
    }

    /// Returns the public key corresponding to this secret.
    pub fn public_key(&self) -> P256PublicKey {
        P256PublicKey(self.0.public_key())
    }

    /// Computes the ECDH shared secret with `their_public`.
    ///
    /// Both parties performing this with the other's public key derive
    /// the identical 32-byte value (the affine x-coordinate).
    pub fn diffie_hellman(&self, their_public: &P256PublicKey) -> SharedSecret {
        let shared = self.0.diffie_hellman(&their_public.0);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(shared.raw_secret_bytes().as_slice());
        SharedSecret(bytes)
    }
}

// P256EphemeralSecret does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// SharedSecret
// ---------------------------------------------------------------------------

/// Raw ECDH output (32 bytes). Never used directly as a key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Returns the raw 32-byte shared secret.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

// SharedSecret does not implement Clone/Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
