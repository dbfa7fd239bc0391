//! Client-side message sealing: AES-256-GCM for confidentiality plus an
//! HMAC-SHA256 over the envelope for sender authenticity.
//!
//! # Seal flow
//!
//! ```text
//! 1. (content, iv, tag) <- AES-256-GCM.encrypt(encryption_key, plaintext)
//! 2. id <- UUID v4, timestamp <- now
//! 3. hmac <- HMAC-SHA256(hmac_key, {id, sender, content, iv, tag, timestamp})
//! ```
//!
//! # Open flow
//!
//! ```text
//! 1. verify hmac (constant time), reject on mismatch
//! 2. plaintext <- AES-256-GCM.decrypt(encryption_key, content, iv, tag)
//! ```
//!
//! The relay never holds these keys; it only forwards sealed messages.

use lanchat_crypto::aead::AesGcmCipher;
use lanchat_crypto::mac::{compute_hmac_b64, verify_hmac_b64};
use lanchat_types::{CryptoFailureKind, LanChatError, Result};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::key_agreement::{DerivedKeys, DERIVED_KEY_LEN};
use crate::message::{unix_now, ChatMessage};

/// Seals and opens [`ChatMessage`]s with one pair of derived keys.
pub struct MessageCipher {
    aead: AesGcmCipher,
    hmac_key: Zeroizing<[u8; DERIVED_KEY_LEN]>,
}

// MessageCipher does not implement Clone/Debug to prevent leakage.

impl MessageCipher {
    /// Builds a cipher from keys produced by key agreement.
    ///
    /// # Errors
    ///
    /// Propagates [`CryptoFailureKind::InvalidKeyLength`] from the AEAD
    /// constructor (not reachable with well-formed [`DerivedKeys`]).
    pub fn new(keys: &DerivedKeys) -> Result<Self> {
        Ok(Self {
            aead: AesGcmCipher::new(keys.encryption_key())?,
            hmac_key: Zeroizing::new(*keys.hmac_key()),
        })
    }

    /// Encrypts `plaintext` and returns a ready-to-send message from
    /// `sender`.
    ///
    /// # Errors
    ///
    /// Returns [`LanChatError::CryptoFailure`] if encryption or MAC
    /// computation fails.
    pub fn seal(&self, sender: &str, plaintext: &str) -> Result<ChatMessage> {
        let encrypted = self.aead.encrypt(plaintext, None)?;

        let mut message = ChatMessage {
            id: Uuid::new_v4().to_string(),
            sender: sender.to_owned(),
            content: encrypted.ciphertext,
            iv: encrypted.iv,
            tag: encrypted.tag,
            hmac: String::new(),
            timestamp: unix_now(),
        };
        message.hmac = compute_hmac_b64(self.hmac_key.as_slice(), &message.hmac_input()?)?;
        Ok(message)
    }

    /// Verifies the HMAC and decrypts `message`.
    ///
    /// # Errors
    ///
    /// - [`CryptoFailureKind::AuthenticationFailure`] if the HMAC or the
    ///   GCM tag does not verify.
    /// - [`LanChatError::DecodeError`] for malformed base64 fields.
    pub fn open(&self, message: &ChatMessage) -> Result<String> {
        let input = message.hmac_input()?;
        if !verify_hmac_b64(self.hmac_key.as_slice(), &input, &message.hmac) {
            return Err(LanChatError::crypto(
                CryptoFailureKind::AuthenticationFailure,
                format!("HMAC mismatch on message {}", message.id),
            ));
        }

        self.aead
            .decrypt(&message.content, &message.iv, &message.tag, None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_agreement::derive_keys_from_secret;
    use crate::key_agreement::DEFAULT_KEY_INFO;

    fn cipher(seed: u8) -> std::result::Result<MessageCipher, LanChatError> {
        let keys = derive_keys_from_secret(&[seed; 32], DEFAULT_KEY_INFO)?;
        MessageCipher::new(&keys)
    }

    fn kind<T>(r: Result<T>) -> Option<CryptoFailureKind> {
        r.err().and_then(|e| e.crypto_kind())
    }

    #[test]
    fn seal_open_roundtrip() -> std::result::Result<(), LanChatError> {
        let c = cipher(0x11)?;
        let msg = c.seal("alice_01", "hello")?;
        assert_eq!(msg.sender, "alice_01");
        assert_ne!(msg.content, "hello");
        assert_eq!(c.open(&msg)?, "hello");
        Ok(())
    }

    #[test]
    fn each_seal_has_fresh_id_and_iv() -> std::result::Result<(), LanChatError> {
        let c = cipher(0x11)?;
        let a = c.seal("alice_01", "same")?;
        let b = c.seal("alice_01", "same")?;
        assert_ne!(a.id, b.id);
        assert_ne!(a.iv, b.iv);
        Ok(())
    }

    #[test]
    fn spoofed_sender_fails_hmac() -> std::result::Result<(), LanChatError> {
        let c = cipher(0x11)?;
        let mut msg = c.seal("alice_01", "hello")?;
        msg.sender = "mallory".into();
        assert_eq!(kind(c.open(&msg)), Some(CryptoFailureKind::AuthenticationFailure));
        Ok(())
    }

    #[test]
    fn altered_timestamp_fails_hmac() -> std::result::Result<(), LanChatError> {
        let c = cipher(0x11)?;
        let mut msg = c.seal("alice_01", "hello")?;
        msg.timestamp += 1.0;
        assert!(c.open(&msg).is_err());
        Ok(())
    }

    #[test]
    fn different_keys_cannot_open() -> std::result::Result<(), LanChatError> {
        let alice = cipher(0x11)?;
        let eve = cipher(0x22)?;
        let msg = alice.seal("alice_01", "hello")?;
        assert_eq!(kind(eve.open(&msg)), Some(CryptoFailureKind::AuthenticationFailure));
        Ok(())
    }
}
