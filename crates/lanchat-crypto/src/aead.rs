//! AES-256-GCM authenticated encryption with associated data.
//!
//! Every message is encrypted under a fresh random 96-bit IV. The wire
//! format keeps ciphertext, IV and the 128-bit tag as separate
//! base64url strings, matching what WebCrypto clients produce.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use lanchat_types::{CryptoFailureKind, LanChatError, Result};

use crate::encoding::{b64url_decode, b64url_encode};
use crate::random::random_array;

/// Required symmetric key length in bytes.
pub const KEY_LEN: usize = 32;

/// AES-GCM IV length in bytes.
pub const IV_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

// ---------------------------------------------------------------------------
// EncryptedPayload
// ---------------------------------------------------------------------------

/// Output of [`AesGcmCipher::encrypt`], every field base64url-encoded.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncryptedPayload {
    /// Encrypted bytes, same length as the plaintext.
    pub ciphertext: String,
    /// The 12-byte IV used for this encryption.
    pub iv: String,
    /// The 16-byte GCM tag.
    pub tag: String,
}

// ---------------------------------------------------------------------------
// AesGcmCipher
// ---------------------------------------------------------------------------

/// AES-256-GCM cipher bound to one 32-byte key.
pub struct AesGcmCipher {
    inner: Aes256Gcm,
}

// AesGcmCipher does not implement Clone/Debug to prevent key leakage.

impl AesGcmCipher {
    /// Builds a cipher from raw key material.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::CryptoFailure`] with kind
    /// [`CryptoFailureKind::InvalidKeyLength`] unless `key` is exactly
    /// 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_LEN {
            return Err(LanChatError::crypto(
                CryptoFailureKind::InvalidKeyLength,
                format!("expected {KEY_LEN}-byte key, got {}", key.len()),
            ));
        }
        let inner = Aes256Gcm::new_from_slice(key).map_err(|e| {
            LanChatError::crypto(
                CryptoFailureKind::InvalidKeyLength,
                format!("AES-256-GCM key init failed: {e}"),
            )
        })?;
        Ok(Self { inner })
    }

    /// Encrypts `plaintext` under a fresh random IV.
    ///
    /// `aad` is authenticated but not encrypted; the same bytes must be
    /// supplied to [`decrypt`](Self::decrypt).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoFailureKind::Internal`] if the backend refuses
    /// the input (only possible for plaintexts beyond the GCM limit).
    pub fn encrypt(&self, plaintext: &str, aad: Option<&[u8]>) -> Result<EncryptedPayload> {
        let iv = random_array::<IV_LEN>();
        let payload = Payload {
            msg: plaintext.as_bytes(),
            aad: aad.unwrap_or_default(),
        };

        let mut sealed = self
            .inner
            .encrypt(Nonce::from_slice(&iv), payload)
            .map_err(|_| {
                LanChatError::crypto(CryptoFailureKind::Internal, "AES-256-GCM encryption failed")
            })?;

        // The backend appends the tag; the wire format carries it apart.
        let tag = sealed.split_off(sealed.len() - TAG_LEN);

        Ok(EncryptedPayload {
            ciphertext: b64url_encode(&sealed),
            iv: b64url_encode(&iv),
            tag: b64url_encode(&tag),
        })
    }

    /// Verifies the tag and decrypts.
    ///
    /// No plaintext is returned unless the tag verifies.
    ///
    /// # Errors
    ///
    /// - [`LanChatError::DecodeError`] for malformed base64, or for a
    ///   verified plaintext that is not UTF-8.
    /// - [`LanChatError::CryptoFailure`] with kind
    ///   [`CryptoFailureKind::AuthenticationFailure`] for a wrong-length
    ///   IV or tag, tampered input, a wrong key or a wrong `aad`.
    pub fn decrypt(
        &self,
        ciphertext: &str,
        iv: &str,
        tag: &str,
        aad: Option<&[u8]>,
    ) -> Result<String> {
        let mut sealed = b64url_decode(ciphertext)?;
        let iv = b64url_decode(iv)?;
        let tag = b64url_decode(tag)?;

        if iv.len() != IV_LEN || tag.len() != TAG_LEN {
            return Err(auth_failure());
        }

        sealed.extend_from_slice(&tag);
        let payload = Payload {
            msg: &sealed,
            aad: aad.unwrap_or_default(),
        };

        let plaintext = self
            .inner
            .decrypt(Nonce::from_slice(&iv), payload)
            .map_err(|_| auth_failure())?;

        String::from_utf8(plaintext).map_err(|_| LanChatError::DecodeError {
            reason: "decrypted payload is not valid UTF-8".into(),
        })
    }
}

fn auth_failure() -> LanChatError {
    LanChatError::crypto(
        CryptoFailureKind::AuthenticationFailure,
        "AES-256-GCM authentication failed",
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    /// Every variant of `b64` with exactly one bit of the decoded bytes
    /// flipped.
    fn single_bit_flips(b64: &str) -> std::result::Result<Vec<String>, LanChatError> {
        let bytes = b64url_decode(b64)?;
        let mut out = Vec::with_capacity(bytes.len() * 8);
        for i in 0..bytes.len() {
            for bit in 0..8 {
                let mut flipped = bytes.clone();
                flipped[i] ^= 1u8 << bit;
                out.push(b64url_encode(&flipped));
            }
        }
        Ok(out)
    }

    fn kind_of(result: Result<String>) -> Option<CryptoFailureKind> {
        result.err().and_then(|e| e.crypto_kind())
    }

    #[test]
    fn encrypt_decrypt_roundtrip() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let out = cipher.encrypt("hello bob", None)?;
        let pt = cipher.decrypt(&out.ciphertext, &out.iv, &out.tag, None)?;
        assert_eq!(pt, "hello bob");
        Ok(())
    }

    #[test]
    fn roundtrip_with_aad() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x01; 32])?;
        let aad = b"msg-42";
        let out = cipher.encrypt("payload", Some(aad))?;
        assert_eq!(
            cipher.decrypt(&out.ciphertext, &out.iv, &out.tag, Some(aad))?,
            "payload"
        );
        Ok(())
    }

    #[test]
    fn empty_plaintext_roundtrip() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x03; 32])?;
        let out = cipher.encrypt("", None)?;
        assert!(out.ciphertext.is_empty());
        assert_eq!(cipher.decrypt(&out.ciphertext, &out.iv, &out.tag, None)?, "");
        Ok(())
    }

    #[test]
    fn wire_lengths() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x05; 32])?;
        let out = cipher.encrypt("abcdef", None)?;
        assert_eq!(b64url_decode(&out.iv)?.len(), IV_LEN);
        assert_eq!(b64url_decode(&out.tag)?.len(), TAG_LEN);
        assert_eq!(b64url_decode(&out.ciphertext)?.len(), 6);
        Ok(())
    }

    #[test]
    fn wrong_key_length_rejected() {
        for len in [0usize, 16, 31, 33, 64] {
            let err = AesGcmCipher::new(&vec![0u8; len]).err();
            assert_eq!(
                err.and_then(|e| e.crypto_kind()),
                Some(CryptoFailureKind::InvalidKeyLength),
                "len {len}"
            );
        }
    }

    #[test]
    fn tampered_ciphertext_fails() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let out = cipher.encrypt("secret", None)?;
        let variants = single_bit_flips(&out.ciphertext)?;
        assert!(!variants.is_empty());
        for bad in variants {
            assert_eq!(
                kind_of(cipher.decrypt(&bad, &out.iv, &out.tag, None)),
                Some(CryptoFailureKind::AuthenticationFailure)
            );
        }
        Ok(())
    }

    #[test]
    fn tampered_iv_fails() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let out = cipher.encrypt("secret", None)?;
        let variants = single_bit_flips(&out.iv)?;
        assert!(!variants.is_empty());
        for bad in variants {
            assert_eq!(
                kind_of(cipher.decrypt(&out.ciphertext, &bad, &out.tag, None)),
                Some(CryptoFailureKind::AuthenticationFailure)
            );
        }
        Ok(())
    }

    #[test]
    fn tampered_tag_fails() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let out = cipher.encrypt("secret", None)?;
        let variants = single_bit_flips(&out.tag)?;
        assert!(!variants.is_empty());
        for bad in variants {
            assert_eq!(
                kind_of(cipher.decrypt(&out.ciphertext, &out.iv, &bad, None)),
                Some(CryptoFailureKind::AuthenticationFailure)
            );
        }
        Ok(())
    }

    #[test]
    fn wrong_key_fails() -> std::result::Result<(), LanChatError> {
        let alice = AesGcmCipher::new(&[0x01; 32])?;
        let mallory = AesGcmCipher::new(&[0x02; 32])?;
        let out = alice.encrypt("secret", None)?;
        assert_eq!(
            kind_of(mallory.decrypt(&out.ciphertext, &out.iv, &out.tag, None)),
            Some(CryptoFailureKind::AuthenticationFailure)
        );
        Ok(())
    }

    #[test]
    fn wrong_aad_fails() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let out = cipher.encrypt("secret", Some(b"correct"))?;
        assert!(cipher
            .decrypt(&out.ciphertext, &out.iv, &out.tag, Some(b"wrong"))
            .is_err());
        assert!(cipher
            .decrypt(&out.ciphertext, &out.iv, &out.tag, None)
            .is_err());
        Ok(())
    }

    #[test]
    fn short_tag_is_authentication_failure() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let out = cipher.encrypt("secret", None)?;
        let short = b64url_encode(&b64url_decode(&out.tag)?[..8]);
        assert_eq!(
            kind_of(cipher.decrypt(&out.ciphertext, &out.iv, &short, None)),
            Some(CryptoFailureKind::AuthenticationFailure)
        );
        Ok(())
    }

    #[test]
    fn malformed_base64_is_decode_error() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let out = cipher.encrypt("secret", None)?;
        assert!(matches!(
            cipher.decrypt("***", &out.iv, &out.tag, None),
            Err(LanChatError::DecodeError { .. })
        ));
        Ok(())
    }

    #[test]
    fn iv_and_ciphertext_unique_over_1000_trials() -> std::result::Result<(), LanChatError> {
        let cipher = AesGcmCipher::new(&[0x42; 32])?;
        let mut ivs = HashSet::new();
        let mut cts = HashSet::new();
        for _ in 0..1000 {
            let out = cipher.encrypt("same plaintext every time", None)?;
            assert!(ivs.insert(out.iv));
            assert!(cts.insert(out.ciphertext));
        }
        Ok(())
    }
}
