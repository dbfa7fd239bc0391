//! Per-peer ephemeral key agreement and key derivation.
//!
//! A [`KeyAgreement`] walks through four states:
//!
//! ```text
//! Empty -> KeypairGenerated -> SharedSecretComputed -> KeysDerived
//! ```
//!
//! # Key derivation parameters
//!
//! - **IKM**: P-256 ECDH shared secret (32 bytes, affine x-coordinate).
//! - **Salt**: none (HKDF uses a zero-filled salt).
//! - **Info**: caller-supplied, [`DEFAULT_KEY_INFO`] unless overridden.
//! - **Output**: 64 bytes, split into the AES-256-GCM key (first half)
//!   and the HMAC-SHA256 key (second half).
//!
//! Regenerating the keypair discards any shared secret and derived
//! keys from the previous round.

use lanchat_crypto::ecdh::{P256EphemeralSecret, P256PublicKey, SharedSecret};
use lanchat_crypto::encoding::{b64url_decode, b64url_encode};
use lanchat_crypto::hkdf::hkdf_sha256;
use lanchat_types::{CryptoFailureKind, LanChatError, Result};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// HKDF info string shared with browser clients.
pub const DEFAULT_KEY_INFO: &[u8] = b"chat_secure_keys";

/// Length of each derived key in bytes.
pub const DERIVED_KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// DerivedKeys
// ---------------------------------------------------------------------------

/// Encryption and HMAC keys derived from one shared secret.
///
/// Both keys are zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKeys {
    encryption_key: [u8; DERIVED_KEY_LEN],
    hmac_key: [u8; DERIVED_KEY_LEN],
}

// DerivedKeys does not implement Clone/Debug to prevent leakage.

impl DerivedKeys {
    /// Returns the 32-byte AES-256-GCM key.
    pub fn encryption_key(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.encryption_key
    }

    /// Returns the 32-byte HMAC-SHA256 key.
    pub fn hmac_key(&self) -> &[u8; DERIVED_KEY_LEN] {
        &self.hmac_key
    }
}

/// Derives [`DerivedKeys`] from a raw ECDH shared secret.
///
/// ```text
/// okm = HKDF-SHA256(IKM = shared_secret, salt = none, info, L = 64)
/// encryption_key = okm[0..32]
/// hmac_key       = okm[32..64]
/// ```
///
/// # Errors
///
/// Returns [`LanChatError::CryptoFailure`] if HKDF expansion fails.
pub fn derive_keys_from_secret(shared_secret: &[u8], info: &[u8]) -> Result<DerivedKeys> {
    let okm = hkdf_sha256(shared_secret, None, info, 2 * DERIVED_KEY_LEN)?;
    match (okm.block32(0), okm.block32(DERIVED_KEY_LEN)) {
        (Some(encryption_key), Some(hmac_key)) => Ok(DerivedKeys {
            encryption_key,
            hmac_key,
        }),
        _ => Err(LanChatError::crypto(
            CryptoFailureKind::Internal,
            "HKDF output shorter than two keys",
        )),
    }
}

// ---------------------------------------------------------------------------
// KeyAgreement
// ---------------------------------------------------------------------------

/// Observable progress of a [`KeyAgreement`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyAgreementState {
    Empty,
    KeypairGenerated,
    SharedSecretComputed,
    KeysDerived,
}

/// Ephemeral key agreement for one peer relationship.
///
/// Owned by a single client and never shared, so it needs no locking.
#[derive(Default)]
pub struct KeyAgreement {
    secret: Option<P256EphemeralSecret>,
    public_key: Option<String>,
    shared: Option<SharedSecret>,
    keys: Option<DerivedKeys>,
}

// KeyAgreement does not implement Clone/Debug to prevent leakage.

impl KeyAgreement {
    /// Creates an agreement in the `Empty` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    pub fn state(&self) -> KeyAgreementState {
        if self.keys.is_some() {
            KeyAgreementState::KeysDerived
        } else if self.shared.is_some() {
            KeyAgreementState::SharedSecretComputed
        } else if self.secret.is_some() {
            KeyAgreementState::KeypairGenerated
        } else {
            KeyAgreementState::Empty
        }
    }

    /// Generates a fresh P-256 keypair and returns the public key as
    /// base64url of the 65-byte uncompressed point.
    ///
    /// Any shared secret or derived keys from a previous round are
    /// dropped (and zeroized).
    pub fn generate_keypair(&mut self) -> String {
        let secret = P256EphemeralSecret::generate();
        let public = b64url_encode(&secret.public_key().to_uncompressed_bytes());

        self.shared = None;
        self.keys = None;
        self.secret = Some(secret);
        self.public_key = Some(public.clone());
        public
    }

    /// Returns the public key produced by the last
    /// [`generate_keypair`](Self::generate_keypair), if any.
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    /// Computes the ECDH shared secret with a peer's encoded public key.
    ///
    /// Replaces any earlier shared secret and derived keys.
    ///
    /// # Errors
    ///
    /// - [`CryptoFailureKind::NotReady`] if no keypair exists.
    /// - [`LanChatError::DecodeError`] for malformed base64.
    /// - [`CryptoFailureKind::InvalidPeerKey`] if the bytes are not a
    ///   point on P-256.
    pub fn compute_shared_secret(&mut self, peer_public_key: &str) -> Result<()> {
        let secret = match &self.secret {
            Some(s) => s,
            None => return Err(not_ready("compute_shared_secret", "no keypair generated")),
        };

        let bytes = b64url_decode(peer_public_key)?;
        let peer = P256PublicKey::from_sec1_bytes(&bytes)?;

        self.keys = None;
        self.shared = Some(secret.diffie_hellman(&peer));
        Ok(())
    }

    /// Derives the encryption and HMAC keys from the shared secret.
    ///
    /// Deterministic for a given shared secret and `info`.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoFailureKind::NotReady`] if no shared secret has
    /// been computed.
    pub fn derive_keys(&mut self, info: &[u8]) -> Result<&DerivedKeys> {
        let shared = match &self.shared {
            Some(s) => s,
            None => return Err(not_ready("derive_keys", "no shared secret computed")),
        };

        let keys = derive_keys_from_secret(shared.as_bytes(), info)?;
        Ok(self.keys.insert(keys))
    }

    /// Returns the derived keys.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoFailureKind::NotReady`] before derivation.
    pub fn keys(&self) -> Result<&DerivedKeys> {
        self.keys
            .as_ref()
            .ok_or_else(|| not_ready("keys", "keys not derived"))
    }

    /// Returns the AES-256-GCM key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoFailureKind::NotReady`] before derivation.
    pub fn encryption_key(&self) -> Result<&[u8; DERIVED_KEY_LEN]> {
        self.keys().map(DerivedKeys::encryption_key)
    }

    /// Returns the HMAC-SHA256 key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoFailureKind::NotReady`] before derivation.
    pub fn hmac_key(&self) -> Result<&[u8; DERIVED_KEY_LEN]> {
        self.keys().map(DerivedKeys::hmac_key)
    }
}

/// Out-of-order use is a programming error on the caller's side, so it
/// is logged loudly as well as returned.
fn not_ready(operation: &'static str, reason: &str) -> LanChatError {
    tracing::error!(operation, reason, "key agreement used out of order");
    LanChatError::crypto(CryptoFailureKind::NotReady, format!("{operation}: {reason}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn kind<T>(r: Result<T>) -> Option<CryptoFailureKind> {
        r.err().and_then(|e| e.crypto_kind())
    }

    #[test]
    fn agreement_is_symmetric() -> std::result::Result<(), LanChatError> {
        let mut alice = KeyAgreement::new();
        let mut bob = KeyAgreement::new();
        let a_pub = alice.generate_keypair();
        let b_pub = bob.generate_keypair();

        alice.compute_shared_secret(&b_pub)?;
        bob.compute_shared_secret(&a_pub)?;

        let a_keys = alice.derive_keys(DEFAULT_KEY_INFO)?;
        let a_enc = *a_keys.encryption_key();
        let a_mac = *a_keys.hmac_key();
        let b_keys = bob.derive_keys(DEFAULT_KEY_INFO)?;

        assert_eq!(&a_enc, b_keys.encryption_key());
        assert_eq!(&a_mac, b_keys.hmac_key());
        assert_ne!(a_enc, a_mac);
        Ok(())
    }

    #[test]
    fn states_progress_in_order() -> std::result::Result<(), LanChatError> {
        let mut ka = KeyAgreement::new();
        assert_eq!(ka.state(), KeyAgreementState::Empty);
        assert!(ka.public_key().is_none());

        let mut peer = KeyAgreement::new();
        let peer_pub = peer.generate_keypair();

        ka.generate_keypair();
        assert_eq!(ka.state(), KeyAgreementState::KeypairGenerated);
        ka.compute_shared_secret(&peer_pub)?;
        assert_eq!(ka.state(), KeyAgreementState::SharedSecretComputed);
        ka.derive_keys(DEFAULT_KEY_INFO)?;
        assert_eq!(ka.state(), KeyAgreementState::KeysDerived);
        Ok(())
    }

    #[test]
    fn public_key_is_87_char_base64url() {
        let mut ka = KeyAgreement::new();
        let public = ka.generate_keypair();
        assert_eq!(public.len(), 87);
        assert!(public
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_eq!(ka.public_key(), Some(public.as_str()));
    }

    #[test]
    fn regenerate_discards_previous_round() -> std::result::Result<(), LanChatError> {
        let mut ka = KeyAgreement::new();
        let mut peer = KeyAgreement::new();
        let peer_pub = peer.generate_keypair();

        let first = ka.generate_keypair();
        ka.compute_shared_secret(&peer_pub)?;
        ka.derive_keys(DEFAULT_KEY_INFO)?;

        let second = ka.generate_keypair();
        assert_ne!(first, second);
        assert_eq!(ka.state(), KeyAgreementState::KeypairGenerated);
        assert_eq!(kind(ka.encryption_key()), Some(CryptoFailureKind::NotReady));
        Ok(())
    }

    #[test]
    fn shared_secret_before_keypair_is_not_ready() {
        let mut ka = KeyAgreement::new();
        let mut peer = KeyAgreement::new();
        let peer_pub = peer.generate_keypair();
        assert_eq!(
            kind(ka.compute_shared_secret(&peer_pub)),
            Some(CryptoFailureKind::NotReady)
        );
    }

    #[test]
    fn derive_before_shared_secret_is_not_ready() {
        let mut ka = KeyAgreement::new();
        ka.generate_keypair();
        assert_eq!(
            kind(ka.derive_keys(DEFAULT_KEY_INFO).map(|_| ())),
            Some(CryptoFailureKind::NotReady)
        );
        assert_eq!(kind(ka.hmac_key()), Some(CryptoFailureKind::NotReady));
    }

    #[test]
    fn invalid_peer_key_rejected() {
        let mut ka = KeyAgreement::new();
        ka.generate_keypair();
        // Right length, wrong content.
        let bogus = b64url_encode(&[0x04; 65]);
        assert_eq!(
            kind(ka.compute_shared_secret(&bogus)),
            Some(CryptoFailureKind::InvalidPeerKey)
        );
        assert_eq!(ka.state(), KeyAgreementState::KeypairGenerated);
    }

    #[test]
    fn malformed_base64_is_decode_error() {
        let mut ka = KeyAgreement::new();
        ka.generate_keypair();
        assert!(matches!(
            ka.compute_shared_secret("@@@"),
            Err(LanChatError::DecodeError { .. })
        ));
    }

    #[test]
    fn derivation_is_deterministic_and_info_bound() -> std::result::Result<(), LanChatError> {
        let shared = [0x42u8; 32];
        let a = derive_keys_from_secret(&shared, DEFAULT_KEY_INFO)?;
        let b = derive_keys_from_secret(&shared, DEFAULT_KEY_INFO)?;
        let c = derive_keys_from_secret(&shared, b"other_info")?;
        assert_eq!(a.encryption_key(), b.encryption_key());
        assert_eq!(a.hmac_key(), b.hmac_key());
        assert_ne!(a.encryption_key(), c.encryption_key());
        Ok(())
    }
}
