//! LanChat relay runtime.
//!
//! Holds the process-lifetime state of the relay (the auth gate, the
//! session table and the message validator) and the handlers a
//! transport drives for each connection. All shared objects are built
//! once by the entry point and passed around by `Arc`.
//!
//! # Modules
//!
//! - [`auth`]: shared-secret gate with per-source attempt throttling
//! - [`session`]: in-memory session table with idle expiry
//! - [`transport`]: the `Transport` seam plus logging/recording impls
//! - [`engine`]: `ChatEngine` event handlers
//! - [`maintenance`]: periodic expiry sweeps

pub mod auth;
pub mod engine;
pub mod maintenance;
pub mod session;
pub mod transport;
