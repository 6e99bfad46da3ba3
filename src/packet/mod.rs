//! Long-header packet codec.
//!
//! Builds and parses the long-header wire format:
//!
//! ```text
//! +-+-+-+-+-+-+-+-+
//! |1| type (7)    |   high bit set = long header
//! +---------------+
//! | version (32)  |
//! +---------------+
//! | DCIL|SCIL (8) |   each nibble stores (len - 3)
//! +---------------+
//! | DCID (*)      |
//! +---------------+
//! | SCID (*)      |
//! +---------------+
//! | type-specific fields (Initial: token length, token)
//! +---------------+
//! | Length (varint) = PN length + payload + 16-byte tag
//! +---------------+
//! | Packet Number (1-4, header-protected)
//! +---------------+
//! | Payload (*)   |   AEAD-sealed
//! +---------------+
//! ```
//!
//! The AEAD binds the header prefix through the unprotected packet number
//! as associated data; the nonce is the direction IV XORed with the packet
//! number. After sealing, a mask derived from a ciphertext sample taken
//! four bytes past the packet-number position is XORed over the
//! packet-number bytes. The type byte carries no protected bits at this
//! draft level, so it is validated before anything else on parse.

mod bytes;
pub mod frame;
pub mod number;
pub mod varint;

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::debug;

use crate::core::{
    AEAD_TAG_SIZE, ConfigError, FIRST_BYTE_HANDSHAKE, FIRST_BYTE_INITIAL, FIRST_BYTE_ZERO_RTT,
    HP_SAMPLE_SIZE, INITIAL_MIN_DATAGRAM_SIZE, MAX_CID_LENGTH, MAX_DATAGRAM_SIZE, MIN_CID_LENGTH,
    ProtocolError, QuicError, QuicResult,
};
use crate::crypto::DirectionalKeys;
use self::bytes::Reader;

pub use self::frame::{AckFrame, CryptoSink, Frame};

/// Monotonically assigned per-packet number.
pub type PacketNumber = u64;

/// Wire version identifier with an "at-least" ordering for draft
/// comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version(u32);

impl Version {
    /// IETF draft-14.
    pub const DRAFT_14: Version = Version(0xff00_000e);
    /// IETF draft-15.
    pub const DRAFT_15: Version = Version(0xff00_000f);
    /// IETF draft-16.
    pub const DRAFT_16: Version = Version(0xff00_0010);

    /// Accept a wire value, rejecting versions this crate does not speak.
    pub fn from_wire(raw: u32) -> Result<Self, ProtocolError> {
        let version = Version(raw);
        match version {
            Self::DRAFT_14 | Self::DRAFT_15 | Self::DRAFT_16 => Ok(version),
            _ => Err(ProtocolError::UnsupportedVersion(raw)),
        }
    }

    /// The 32-bit wire value.
    pub fn to_wire(self) -> u32 {
        self.0
    }

    /// Whether this version is `other` or a later draft.
    pub fn at_least(self, other: Version) -> bool {
        self.0 >= other.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "draft-{}", self.0 & 0xff)
    }
}

/// Connection identifier, 3 to 18 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionId(Vec<u8>);

impl ConnectionId {
    /// Wrap `bytes`, rejecting lengths the DCIL/SCIL nibble cannot encode.
    pub fn new(bytes: Vec<u8>) -> Result<Self, ConfigError> {
        if bytes.len() < MIN_CID_LENGTH || bytes.len() > MAX_CID_LENGTH {
            return Err(ConfigError::ConnectionIdLength(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Mint a fresh random connection id of `len` bytes.
    pub fn random(len: usize) -> Result<Self, ConfigError> {
        if !(MIN_CID_LENGTH..=MAX_CID_LENGTH).contains(&len) {
            return Err(ConfigError::ConnectionIdLength(len));
        }
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        Ok(Self(bytes))
    }

    /// Lengths from the wire nibble are in range by construction.
    fn from_wire(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; connection ids carry at least three bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ConnectionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", hex::encode(&self.0))
    }
}

/// Long-header packet subtype with its type-specific header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketType {
    /// Initial packet; the datagram is padded to at least 1200 bytes.
    Initial {
        /// Address-validation token, empty when none was offered.
        token: Vec<u8>,
    },
    /// Handshake packet.
    Handshake,
    /// 0-RTT protected packet.
    ZeroRtt,
}

impl PacketType {
    fn first_byte(&self) -> u8 {
        match self {
            Self::Initial { .. } => FIRST_BYTE_INITIAL,
            Self::Handshake => FIRST_BYTE_HANDSHAKE,
            Self::ZeroRtt => FIRST_BYTE_ZERO_RTT,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Initial { .. } => "initial",
            Self::Handshake => "handshake",
            Self::ZeroRtt => "0-rtt",
        }
    }
}

/// A long-header packet, immutable once serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeaderPacket {
    /// Subtype and its type-specific fields.
    pub packet_type: PacketType,
    /// Wire version.
    pub version: Version,
    /// Destination connection id.
    pub dcid: ConnectionId,
    /// Source connection id.
    pub scid: ConnectionId,
    /// Assigned packet number.
    pub packet_number: PacketNumber,
    /// Opaque frame bytes. On parse this includes any zero padding the
    /// sender sealed in.
    pub payload: Vec<u8>,
}

impl LongHeaderPacket {
    /// Serialize into a single protected datagram.
    ///
    /// `keys` is the send direction of the connection secrets. Initial
    /// packets are padded so the datagram is at least 1200 bytes; every
    /// packet is padded far enough for the header-protection sample.
    pub fn build(&self, keys: &DirectionalKeys) -> QuicResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(MAX_DATAGRAM_SIZE);
        buf.push(self.packet_type.first_byte());
        buf.extend_from_slice(&self.version.to_wire().to_be_bytes());
        let dcil = (self.dcid.len() - MIN_CID_LENGTH) as u8;
        let scil = (self.scid.len() - MIN_CID_LENGTH) as u8;
        buf.push(dcil << 4 | scil);
        buf.extend_from_slice(self.dcid.as_bytes());
        buf.extend_from_slice(self.scid.as_bytes());
        if let PacketType::Initial { token } = &self.packet_type {
            varint::encode(token.len() as u64, &mut buf);
            buf.extend_from_slice(token);
        }

        let mut pn_bytes = Vec::with_capacity(4);
        let pn_len = number::encode(self.packet_number, &mut pn_bytes);

        // the mask sample reaches 4 bytes past the packet-number position
        let mut padding = 4usize
            .saturating_sub(pn_len)
            .saturating_sub(self.payload.len());
        if matches!(self.packet_type, PacketType::Initial { .. }) {
            loop {
                let length = pn_len + self.payload.len() + padding + AEAD_TAG_SIZE;
                let total = buf.len() + varint::encoded_len(length as u64) + length;
                if total >= INITIAL_MIN_DATAGRAM_SIZE {
                    break;
                }
                padding += INITIAL_MIN_DATAGRAM_SIZE - total;
            }
        }

        let length = pn_len + self.payload.len() + padding + AEAD_TAG_SIZE;
        let total = buf.len() + varint::encoded_len(length as u64) + length;
        if total > MAX_DATAGRAM_SIZE {
            return Err(ConfigError::DatagramTooLarge {
                size: total,
                max: MAX_DATAGRAM_SIZE,
            }
            .into());
        }
        varint::encode(length as u64, &mut buf);
        let pn_offset = buf.len();
        buf.extend_from_slice(&pn_bytes);

        let mut plaintext = Vec::with_capacity(self.payload.len() + padding);
        plaintext.extend_from_slice(&self.payload);
        plaintext.resize(self.payload.len() + padding, 0);

        // the prefix written so far is the associated data
        let ciphertext = keys.seal(self.packet_number, &buf, &plaintext)?;
        let sample_offset = 4 - pn_len;
        let mask =
            keys.header_protection_mask(&ciphertext[sample_offset..sample_offset + HP_SAMPLE_SIZE]);
        buf.extend_from_slice(&ciphertext);
        for i in 0..pn_len {
            buf[pn_offset + i] ^= mask[1 + i];
        }

        debug!(
            target: "packet",
            pn = self.packet_number,
            size = buf.len(),
            bytes = %hex::encode(&buf),
            "built {} packet",
            self.packet_type.label(),
        );
        Ok(buf)
    }

    /// Parse a protected datagram.
    ///
    /// `keys` is the receive direction of the connection secrets;
    /// `largest_acked` drives packet-number reconstruction. AEAD failure
    /// surfaces as [`QuicError::Authentication`] so the caller can drop
    /// the packet and keep the connection.
    pub fn parse(
        datagram: &[u8],
        keys: &DirectionalKeys,
        largest_acked: Option<PacketNumber>,
    ) -> QuicResult<Self> {
        let mut r = Reader::new(datagram);
        let first = r.u8("first byte")?;
        if !matches!(
            first,
            FIRST_BYTE_INITIAL | FIRST_BYTE_HANDSHAKE | FIRST_BYTE_ZERO_RTT
        ) {
            return Err(ProtocolError::InvalidFirstByte(first).into());
        }
        let version = Version::from_wire(r.u32("version")?)?;
        let lengths = r.u8("connection id lengths")?;
        let dcid_len = (lengths >> 4) as usize + MIN_CID_LENGTH;
        let scid_len = (lengths & 0x0f) as usize + MIN_CID_LENGTH;
        let dcid = ConnectionId::from_wire(r.bytes(dcid_len, "destination connection id")?);
        let scid = ConnectionId::from_wire(r.bytes(scid_len, "source connection id")?);
        let packet_type = match first {
            FIRST_BYTE_INITIAL => {
                let token_len = r.varint("token length")? as usize;
                let token = r.bytes(token_len, "token")?.to_vec();
                PacketType::Initial { token }
            }
            FIRST_BYTE_HANDSHAKE => PacketType::Handshake,
            _ => PacketType::ZeroRtt,
        };

        let length = r.varint("length")? as usize;
        let pn_offset = r.pos();
        if length > r.remaining() {
            return Err(ProtocolError::LengthOverrun {
                declared: length,
                available: r.remaining(),
            }
            .into());
        }
        if length < 4 + HP_SAMPLE_SIZE {
            return Err(ProtocolError::UnexpectedEnd("header protection sample").into());
        }

        // unmask four bytes, read the true width from the prefix bits, and
        // leave the datagram untouched so the tail stays ciphertext
        let sample_offset = pn_offset + 4;
        let mask = keys
            .header_protection_mask(&datagram[sample_offset..sample_offset + HP_SAMPLE_SIZE]);
        let mut pn_bytes = [0u8; 4];
        pn_bytes.copy_from_slice(&datagram[pn_offset..pn_offset + 4]);
        for i in 0..4 {
            pn_bytes[i] ^= mask[1 + i];
        }
        let (truncated, pn_len, pn_bits) = number::decode(&pn_bytes);
        let packet_number = number::expand(truncated, pn_bits, largest_acked);

        let mut aad = datagram[..pn_offset + pn_len].to_vec();
        aad[pn_offset..].copy_from_slice(&pn_bytes[..pn_len]);
        let ciphertext = &datagram[pn_offset + pn_len..pn_offset + length];
        let payload = keys
            .open(packet_number, &aad, ciphertext)
            .map_err(|_| QuicError::Authentication)?;

        debug!(
            target: "packet",
            pn = packet_number,
            %version,
            size = datagram.len(),
            "parsed {} packet",
            packet_type.label(),
        );
        Ok(Self {
            packet_type,
            version,
            dcid,
            scid,
            packet_number,
            payload,
        })
    }

    /// Dispatch the decrypted payload, handing CRYPTO bytes to `sink`.
    pub fn frames(&self, sink: &mut dyn CryptoSink) -> QuicResult<Vec<Frame>> {
        frame::dispatch(&self.payload, self.version, sink)
    }
}
