//! Packet protection: keying material, AEAD sealing, header-protection
//! masks, and the handshake-independent initial-secret derivation.

mod secrets;

pub use secrets::{ConnectionSecrets, DirectionalKeys};
