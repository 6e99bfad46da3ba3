//! QUIC variable-length integers.
//!
//! The two high bits of the first byte select the length class
//! { 0 → 1 byte, 1 → 2, 2 → 4, 3 → 8 }; the remaining bits hold the
//! big-endian value. The encoder always picks the smallest class that
//! fits.

use crate::core::{ProtocolError, VARINT_MAX};

/// Number of bytes [`encode`] will use for `value`.
pub fn encoded_len(value: u64) -> usize {
    if value < 1 << 6 {
        1
    } else if value < 1 << 14 {
        2
    } else if value < 1 << 30 {
        4
    } else {
        8
    }
}

/// Append `value` to `out` in the smallest class that fits, returning the
/// number of bytes written. Values above [`VARINT_MAX`] are not encodable.
pub fn encode(value: u64, out: &mut Vec<u8>) -> usize {
    debug_assert!(value <= VARINT_MAX);
    let len = encoded_len(value);
    match len {
        1 => out.push(value as u8),
        2 => out.extend_from_slice(&(0x4000 | value as u16).to_be_bytes()),
        4 => out.extend_from_slice(&(0x8000_0000 | value as u32).to_be_bytes()),
        _ => out.extend_from_slice(&(0xc000_0000_0000_0000 | value).to_be_bytes()),
    }
    len
}

/// Decode a varint from the front of `buf`, returning the value and the
/// number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(u64, usize), ProtocolError> {
    let first = *buf.first().ok_or(ProtocolError::UnexpectedEnd("varint"))?;
    let len = 1usize << (first >> 6);
    if buf.len() < len {
        return Err(ProtocolError::UnexpectedEnd("varint"));
    }
    let mut value = u64::from(first & 0x3f);
    for byte in &buf[1..len] {
        value = value << 8 | u64::from(*byte);
    }
    Ok((value, len))
}
