//! Known-vector tests for cryptographic primitives.
//!
//! Test vectors sourced from:
//! - AES-256-GCM: NIST GCM test cases 13 and 14 (zero key, zero IV)
//! - P-256: the curve generator point from SEC 2
//! - HKDF: key schedule output pinned against an independent computation
//! - HMAC / PBKDF2: covered by RFC vectors in the unit tests

use lanchat_crypto::aead::AesGcmCipher;
use lanchat_crypto::ecdh::{P256EphemeralSecret, P256PublicKey};
use lanchat_crypto::encoding::{b64url_decode, b64url_encode};
use lanchat_crypto::hkdf::hkdf_sha256;
use lanchat_crypto::kdf::{pbkdf2_hash, verify_password};
use lanchat_crypto::mac::{compute_hmac_b64, verify_hmac_b64};
use lanchat_types::{CryptoFailureKind, LanChatError};

// ===================================================================
// AES-256-GCM: NIST test cases
// ===================================================================

#[test]
fn aes_gcm_nist_case_13_empty_plaintext() -> std::result::Result<(), LanChatError> {
    let cipher = AesGcmCipher::new(&[0u8; 32])?;
    // Tag 530f8afbc74536b9a963b4f1c4cb738b
    let pt = cipher.decrypt("", "AAAAAAAAAAAAAAAA", "Uw-K-8dFNrmpY7TxxMtziw", None)?;
    assert!(pt.is_empty());
    Ok(())
}

#[test]
fn aes_gcm_nist_case_14_one_block() -> std::result::Result<(), LanChatError> {
    let cipher = AesGcmCipher::new(&[0u8; 32])?;
    // Ciphertext cea7403d4d606b6e074ec5d3baf39d18
    // Tag        d0d1c8a799996bf0265b98b5d48ab919
    let pt = cipher.decrypt(
        "zqdAPU1ga24HTsXTuvOdGA",
        "AAAAAAAAAAAAAAAA",
        "0NHIp5mZa_AmW5i11Iq5GQ",
        None,
    )?;
    assert_eq!(pt.as_bytes(), &[0u8; 16]);
    Ok(())
}

#[test]
fn aes_gcm_nist_case_14_rejects_flipped_tag() -> std::result::Result<(), LanChatError> {
    let cipher = AesGcmCipher::new(&[0u8; 32])?;
    let mut tag = b64url_decode("0NHIp5mZa_AmW5i11Iq5GQ")?;
    tag[15] ^= 0x80;
    let result = cipher.decrypt(
        "zqdAPU1ga24HTsXTuvOdGA",
        "AAAAAAAAAAAAAAAA",
        &b64url_encode(&tag),
        None,
    );
    assert_eq!(
        result.err().and_then(|e| e.crypto_kind()),
        Some(CryptoFailureKind::AuthenticationFailure)
    );
    Ok(())
}

// ===================================================================
// P-256 point encoding
// ===================================================================

const P256_GENERATOR_B64: &str =
    "BGsX0fLhLEJH-Lzm5WOkQPJ3A32BLeszoPShOUXYmMKWT-NC4v4af5uO5-tKfA-eFivOM1drMV7Oy7ZAaDe_UfU";

#[test]
fn p256_generator_parses_and_reencodes() -> std::result::Result<(), LanChatError> {
    let bytes = b64url_decode(P256_GENERATOR_B64)?;
    assert_eq!(bytes.len(), 65);
    let pk = P256PublicKey::from_sec1_bytes(&bytes)?;
    assert_eq!(b64url_encode(&pk.to_uncompressed_bytes()), P256_GENERATOR_B64);
    Ok(())
}

#[test]
fn p256_public_key_wire_length_is_87_chars() {
    let secret = P256EphemeralSecret::generate();
    let encoded = b64url_encode(&secret.public_key().to_uncompressed_bytes());
    assert_eq!(encoded.len(), 87);
}

#[test]
fn p256_x25519_sized_key_rejected() {
    // A 32-byte Curve25519 public key is not a SEC1 point.
    let err = P256PublicKey::from_sec1_bytes(&[0x09; 32]).err();
    assert_eq!(
        err.and_then(|e| e.crypto_kind()),
        Some(CryptoFailureKind::InvalidPeerKey)
    );
}

// ===================================================================
// HKDF key schedule
// ===================================================================

#[test]
fn hkdf_key_schedule_vector() -> std::result::Result<(), LanChatError> {
    // IKM = 00 01 .. 1f, no salt, info = "chat_secure_keys", L = 64.
    let ikm: Vec<u8> = (0u8..32).collect();
    let okm = hkdf_sha256(&ikm, None, b"chat_secure_keys", 64)?;
    let expected: [u8; 64] = [
        0xa8, 0xb3, 0xb0, 0x8b, 0x27, 0xb4, 0x77, 0x13,
        0x2c, 0x8e, 0xbd, 0xf7, 0xc5, 0xde, 0xe9, 0xaf,
        0xa7, 0x75, 0xb2, 0xed, 0xee, 0xe4, 0xa9, 0x73,
        0xdc, 0x0e, 0x42, 0x02, 0xea, 0x70, 0x6b, 0x2b,
        0x7d, 0xb7, 0x41, 0x3f, 0x14, 0x63, 0x23, 0xe7,
        0x36, 0xaa, 0x31, 0x65, 0x65, 0x4b, 0x2f, 0x68,
        0xe4, 0xf0, 0x95, 0x45, 0xc1, 0x0e, 0x96, 0x85,
        0x13, 0x89, 0x50, 0xeb, 0xa3, 0xfa, 0x3f, 0x74,
    ];
    assert_eq!(okm.as_bytes(), &expected);
    Ok(())
}

// ===================================================================
// Cross-primitive composition
// ===================================================================

#[test]
fn ecdh_then_hkdf_then_aead_roundtrip() -> std::result::Result<(), LanChatError> {
    let alice = P256EphemeralSecret::generate();
    let bob = P256EphemeralSecret::generate();

    let a_shared = alice.diffie_hellman(&bob.public_key());
    let b_shared = bob.diffie_hellman(&alice.public_key());

    let a_okm = hkdf_sha256(a_shared.as_bytes(), None, b"chat_secure_keys", 64)?;
    let b_okm = hkdf_sha256(b_shared.as_bytes(), None, b"chat_secure_keys", 64)?;

    let a_cipher = AesGcmCipher::new(&a_okm.as_bytes()[..32])?;
    let b_cipher = AesGcmCipher::new(&b_okm.as_bytes()[..32])?;

    let sealed = a_cipher.encrypt("over the wire", None)?;
    let opened = b_cipher.decrypt(&sealed.ciphertext, &sealed.iv, &sealed.tag, None)?;
    assert_eq!(opened, "over the wire");

    let tag = compute_hmac_b64(&a_okm.as_bytes()[32..], sealed.ciphertext.as_bytes())?;
    assert!(verify_hmac_b64(
        &b_okm.as_bytes()[32..],
        sealed.ciphertext.as_bytes(),
        &tag
    ));
    Ok(())
}

#[test]
fn pbkdf2_hash_survives_verify_with_stored_salt() {
    let stored = pbkdf2_hash("swordfish", Some(b"fixed-salt-for-test-0123456789ab"));
    assert!(verify_password("swordfish", &stored));
    assert!(!verify_password("Swordfish", &stored));
}
