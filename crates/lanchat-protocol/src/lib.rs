//! Message protocol for the LanChat secure session engine.
//!
//! Defines the wire format exchanged over the relay, the per-peer
//! P-256 key agreement and key schedule, client-side sealing of
//! messages, and the relay's replay and input validation.
//!
//! # Modules
//!
//! - [`message`]: `ChatMessage`, `ClientEvent`, `ServerEvent`
//! - [`key_agreement`]: ECDH state machine and HKDF key split
//! - [`cipher`]: AES-256-GCM + HMAC-SHA256 message sealing
//! - [`nonce`]: Bounded FIFO nonce cache for replay detection
//! - [`validation`]: `MessageValidator` and `sanitize`

pub mod cipher;
pub mod key_agreement;
pub mod message;
pub mod nonce;
pub mod validation;
