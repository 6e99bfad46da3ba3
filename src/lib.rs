//! # Quiver
//!
//! The transport core of a QUIC client. Two cooperating components:
//!
//! - **Packet codec** ([`packet`]): builds and parses long-header packets
//!   with authenticated encryption and packet-number protection. Outbound,
//!   the sender hands it frame bytes and gets back a single datagram;
//!   inbound, it validates the header, opens the AEAD, and dispatches the
//!   decrypted frames.
//! - **Congestion controller** ([`congestion`]): a NewReno window in bytes.
//!   Acks and losses from the loss-detection layer feed in; the window
//!   gates the sender through [`congestion::NewRenoController::can_send`].
//!
//! Everything else is a collaborator behind a narrow seam: key material
//! arrives as [`crypto::ConnectionSecrets`], CRYPTO frame bytes leave
//! through [`packet::CryptoSink`], and diagnostics flow through `tracing`
//! (congestion-control events under the `cc` target).
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Connection / loss detection       │
//! ├────────────────────┬────────────────────┤
//! │    Packet codec    │  NewReno window    │  ← this crate
//! │  build / parse /   │  can_send, acked,  │
//! │  frame dispatch    │  lost              │
//! ├────────────────────┴────────────────────┤
//! │                  UDP                    │
//! └─────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod congestion;
pub mod core;
pub mod crypto;
pub mod packet;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::congestion::{Mode, NewRenoController, PacketInfo};
    pub use crate::core::*;
    pub use crate::crypto::{ConnectionSecrets, DirectionalKeys};
    pub use crate::packet::{
        AckFrame, ConnectionId, CryptoSink, Frame, LongHeaderPacket, PacketNumber, PacketType,
        Version,
    };
}

pub use crate::congestion::{NewRenoController, PacketInfo};
pub use crate::core::{ConfigError, ProtocolError, QuicError, QuicResult};
pub use crate::crypto::ConnectionSecrets;
pub use crate::packet::{ConnectionId, LongHeaderPacket, PacketType, Version};
