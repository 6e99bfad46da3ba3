//! Error types for the transport core.
//!
//! The codec surfaces errors with enough context to name the field that
//! failed and the offending byte; it never logs and rethrows. The
//! congestion controller does not error.

use thiserror::Error;

/// Wire bytes violate the protocol. Fatal for the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The 32-bit version field is not one this crate speaks.
    #[error("unsupported version 0x{0:08x}")]
    UnsupportedVersion(u32),

    /// The first byte is not a recognized long-header type marker.
    #[error("unrecognized first byte 0x{0:02x}")]
    InvalidFirstByte(u8),

    /// The buffer ended inside the named field.
    #[error("unexpected end of packet while reading {0}")]
    UnexpectedEnd(&'static str),

    /// The Length field claims more bytes than the datagram holds.
    #[error("declared length {declared} exceeds {available} available bytes")]
    LengthOverrun {
        /// Bytes the Length field declared.
        declared: usize,
        /// Bytes actually left in the datagram.
        available: usize,
    },

    /// An ack block or gap does not fit below its preceding range.
    #[error("ack block underflows below packet number zero")]
    InvalidAckBlock,
}

/// Build inputs violate a precondition. Programmer error; fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Connection id length outside the encodable range.
    #[error("connection id length {0} outside [3, 18]")]
    ConnectionIdLength(usize),

    /// The built datagram would not fit in one MTU.
    #[error("datagram of {size} bytes exceeds the {max}-byte MTU")]
    DatagramTooLarge {
        /// Size the datagram would have.
        size: usize,
        /// Largest permitted datagram.
        max: usize,
    },
}

/// AEAD mechanics failed.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Sealing failed inside the AEAD implementation.
    #[error("AEAD seal failed")]
    SealFailed,

    /// The tag did not verify or the ciphertext is malformed.
    #[error("AEAD open failed (invalid tag or corrupted)")]
    OpenFailed,
}

/// Top-level error of the transport core.
#[derive(Debug, Error)]
pub enum QuicError {
    /// Protocol violation in wire bytes.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    /// AEAD open failed. The packet is dropped; recoverable for the caller.
    #[error("packet authentication failed")]
    Authentication,

    /// A recognized but unsupported frame codepoint.
    #[error("frame type 0x{0:02x} not yet implemented")]
    NotYetImplemented(u8),

    /// Precondition violation on build inputs.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// AEAD seal failure while building.
    #[error("crypto failure: {0}")]
    Crypto(#[from] CryptoError),
}

/// Result alias for transport-core operations.
pub type QuicResult<T> = Result<T, QuicError>;
