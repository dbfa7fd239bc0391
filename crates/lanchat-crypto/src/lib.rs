//! Cryptographic primitives for the LanChat secure session engine.
//!
//! This crate is the **sole** location for raw cryptographic operations.
//! Protocol and node crates compose these functions but never touch a
//! cipher, curve or hash directly.
//!
//! # Modules
//!
//! - [`random`]: OS-backed secure random bytes
//! - [`encoding`]: URL-safe base64 encode/decode
//! - [`mac`]: HMAC-SHA256 computation and constant-time verification
//! - [`kdf`]: PBKDF2-HMAC-SHA256 password hashing
//! - [`hkdf`]: HKDF-SHA256 key expansion
//! - [`ecdh`]: ephemeral ECDH over NIST P-256
//! - [`aead`]: AES-256-GCM authenticated encryption

pub mod aead;
pub mod ecdh;
pub mod encoding;
pub mod hkdf;
pub mod kdf;
pub mod mac;
pub mod random;
