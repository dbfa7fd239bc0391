//! PBKDF2-HMAC-SHA256 password hashing for the shared group secret.
//!
//! The bootstrap secret is never stored in clear: the auth gate keeps a
//! [`PasswordHash`] (derived key + salt) and recomputes it for every
//! candidate. Comparison is constant time.

use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::random::random_array;

/// PBKDF2 iteration count.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Length of the derived hash in bytes.
pub const HASH_LEN: usize = 32;

/// Length of a freshly generated salt in bytes.
pub const SALT_LEN: usize = 32;

// ---------------------------------------------------------------------------
// PasswordHash
// ---------------------------------------------------------------------------

/// Derived key and the salt it was derived with.
///
/// Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PasswordHash {
    hash: [u8; HASH_LEN],
    salt: Vec<u8>,
}

impl PasswordHash {
    /// Returns the derived key bytes.
    pub fn hash(&self) -> &[u8; HASH_LEN] {
        &self.hash
    }

    /// Returns the salt used for derivation.
    pub fn salt(&self) -> &[u8] {
        &self.salt
    }
}

// PasswordHash does not implement Debug to prevent leakage.

// ---------------------------------------------------------------------------
// Hash / verify
// ---------------------------------------------------------------------------

/// Hashes `password` with PBKDF2-HMAC-SHA256.
///
/// When `salt` is `None` a fresh 32-byte salt is drawn from the OS CSPRNG.
pub fn pbkdf2_hash(password: &str, salt: Option<&[u8]>) -> PasswordHash {
    let salt = match salt {
        Some(s) => s.to_vec(),
        None => random_array::<SALT_LEN>().to_vec(),
    };

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut hash);

    PasswordHash { hash, salt }
}

/// Recomputes the hash of `password` with the stored salt and compares
/// it to the stored hash in constant time.
pub fn verify_password(password: &str, stored: &PasswordHash) -> bool {
    let candidate = pbkdf2_hash(password, Some(stored.salt()));
    candidate.hash.ct_eq(&stored.hash).into()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic_for_same_salt() {
        let salt = [0x11u8; 32];
        let a = pbkdf2_hash("swordfish", Some(&salt));
        let b = pbkdf2_hash("swordfish", Some(&salt));
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.salt(), &salt);
    }

    #[test]
    fn fresh_salt_generated_when_absent() {
        let a = pbkdf2_hash("swordfish", None);
        let b = pbkdf2_hash("swordfish", None);
        assert_eq!(a.salt().len(), SALT_LEN);
        assert_ne!(a.salt(), b.salt());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn verify_accepts_correct_password() {
        let stored = pbkdf2_hash("correct horse", None);
        assert!(verify_password("correct horse", &stored));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let stored = pbkdf2_hash("correct horse", None);
        assert!(!verify_password("correct hors", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn empty_password_is_allowed() {
        let stored = pbkdf2_hash("", None);
        assert!(verify_password("", &stored));
    }

    /// RFC 7914 §11 PBKDF2-HMAC-SHA256 vector, truncated to 32 bytes
    /// (P="passwd", S="salt", c=1) checked through the raw primitive
    /// to pin the underlying crate's behaviour.
    #[test]
    fn rfc7914_vector_prefix() {
        let mut out = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(b"passwd", b"salt", 1, &mut out);
        let expected: [u8; 32] = [
            0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f,
            0xec, 0x16, 0x91, 0xc2, 0x25, 0x44, 0xb6, 0x05,
            0xf9, 0x41, 0x85, 0x21, 0x6d, 0xde, 0x04, 0x65,
            0xe6, 0x8b, 0x9d, 0x57, 0xc2, 0x0d, 0xac, 0xbc,
        ];
        assert_eq!(out, expected);
    }
}
