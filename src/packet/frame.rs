//! Frame dispatch over a decrypted packet payload.
//!
//! Only the skeleton lives here. Padding runs are skipped, CRYPTO bytes
//! are handed to the TLS state holder, and ack bodies are read far enough
//! for the loss detector to consume them. Any other codepoint surfaces as
//! [`QuicError::NotYetImplemented`].
//!
//! The ack codepoint moved between drafts: before draft-15 it is `0x0d`,
//! from draft-15 it is `0x1a` with `0x1b` carrying ECN counts.

use super::bytes::Reader;
use super::{PacketNumber, Version};
use crate::core::{
    FRAME_TYPE_ACK, FRAME_TYPE_ACK_ECN, FRAME_TYPE_ACK_OLD, FRAME_TYPE_CRYPTO, FRAME_TYPE_PADDING,
    ProtocolError, QuicError, QuicResult,
};

/// Recipient of CRYPTO frame bytes (the TLS state holder).
pub trait CryptoSink {
    /// Consume handshake bytes at the given crypto-stream offset.
    fn crypto_data(&mut self, offset: u64, data: &[u8]);
}

/// An acknowledgment frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    /// Largest packet number the peer acknowledges.
    pub largest_acknowledged: PacketNumber,
    /// Ack delay in the peer's encoded unit.
    pub ack_delay: u64,
    /// Acknowledged ranges as (smallest, largest), descending.
    pub ranges: Vec<(PacketNumber, PacketNumber)>,
}

/// A frame recognized by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A run of padding bytes.
    Padding(usize),
    /// Handshake bytes for the TLS state holder.
    Crypto {
        /// Offset in the crypto stream.
        offset: u64,
        /// The handshake bytes.
        data: Vec<u8>,
    },
    /// An acknowledgment.
    Ack(AckFrame),
}

/// Walk `payload` until it is empty, handing CRYPTO bytes to `sink` as
/// they appear and returning every recognized frame in order.
pub fn dispatch(
    payload: &[u8],
    version: Version,
    sink: &mut dyn CryptoSink,
) -> QuicResult<Vec<Frame>> {
    let mut r = Reader::new(payload);
    let mut frames = Vec::new();
    while let Some(first) = r.peek() {
        match first {
            FRAME_TYPE_PADDING => {
                let mut run = 0;
                while r.peek() == Some(FRAME_TYPE_PADDING) {
                    r.u8("padding")?;
                    run += 1;
                }
                frames.push(Frame::Padding(run));
            }
            FRAME_TYPE_CRYPTO => {
                r.u8("frame type")?;
                let offset = r.varint("crypto offset")?;
                let len = r.varint("crypto length")? as usize;
                let data = r.bytes(len, "crypto data")?;
                sink.crypto_data(offset, data);
                frames.push(Frame::Crypto {
                    offset,
                    data: data.to_vec(),
                });
            }
            byte if is_ack(byte, version) => {
                r.u8("frame type")?;
                frames.push(Frame::Ack(parse_ack(&mut r, byte == FRAME_TYPE_ACK_ECN)?));
            }
            other => return Err(QuicError::NotYetImplemented(other)),
        }
    }
    Ok(frames)
}

fn is_ack(byte: u8, version: Version) -> bool {
    if version.at_least(Version::DRAFT_15) {
        byte == FRAME_TYPE_ACK || byte == FRAME_TYPE_ACK_ECN
    } else {
        byte == FRAME_TYPE_ACK_OLD
    }
}

fn parse_ack(r: &mut Reader<'_>, ecn: bool) -> QuicResult<AckFrame> {
    let largest = r.varint("largest acknowledged")?;
    let ack_delay = r.varint("ack delay")?;
    let block_count = r.varint("ack block count")?;
    let first_block = r.varint("first ack block")?;
    let mut smallest = largest
        .checked_sub(first_block)
        .ok_or(ProtocolError::InvalidAckBlock)?;
    let mut ranges = vec![(smallest, largest)];
    for _ in 0..block_count {
        let gap = r.varint("ack gap")?;
        let block = r.varint("ack block")?;
        let next_largest = smallest
            .checked_sub(gap)
            .and_then(|v| v.checked_sub(2))
            .ok_or(ProtocolError::InvalidAckBlock)?;
        smallest = next_largest
            .checked_sub(block)
            .ok_or(ProtocolError::InvalidAckBlock)?;
        ranges.push((smallest, next_largest));
    }
    if ecn {
        r.varint("ect0 count")?;
        r.varint("ect1 count")?;
        r.varint("ecn-ce count")?;
    }
    Ok(AckFrame {
        largest_acknowledged: largest,
        ack_delay,
        ranges,
    })
}
