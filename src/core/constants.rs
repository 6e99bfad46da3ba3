//! Protocol constants.
//!
//! These values are fixed by the wire format and MUST NOT be changed.

// =============================================================================
// PACKET PROTECTION
// =============================================================================

/// Poly1305 authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

/// ChaCha20-Poly1305 key size.
pub const AEAD_KEY_SIZE: usize = 32;

/// ChaCha20-Poly1305 nonce and IV size.
pub const AEAD_IV_SIZE: usize = 12;

/// Header-protection key size.
pub const HP_KEY_SIZE: usize = 32;

/// Ciphertext sample length used to derive the header-protection mask.
pub const HP_SAMPLE_SIZE: usize = 16;

/// Header-protection mask length (one first-byte lane plus four
/// packet-number lanes).
pub const HP_MASK_SIZE: usize = 5;

// =============================================================================
// LONG HEADER
// =============================================================================

/// First byte of an Initial packet (long-header bit plus 7-bit type).
pub const FIRST_BYTE_INITIAL: u8 = 0xff;

/// First byte of a Handshake packet.
pub const FIRST_BYTE_HANDSHAKE: u8 = 0xfd;

/// First byte of a 0-RTT protected packet.
pub const FIRST_BYTE_ZERO_RTT: u8 = 0xfc;

/// Smallest connection id the DCIL/SCIL nibble can express.
pub const MIN_CID_LENGTH: usize = 3;

/// Largest connection id the DCIL/SCIL nibble can express.
pub const MAX_CID_LENGTH: usize = 18;

/// Upper bound on a produced datagram.
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Client Initial datagrams are padded up to this size.
pub const INITIAL_MIN_DATAGRAM_SIZE: usize = 1200;

/// Largest value a variable-length integer can carry.
pub const VARINT_MAX: u64 = (1 << 62) - 1;

// =============================================================================
// FRAME TYPES
// =============================================================================

/// Padding frame.
pub const FRAME_TYPE_PADDING: u8 = 0x00;

/// CRYPTO frame carrying handshake bytes.
pub const FRAME_TYPE_CRYPTO: u8 = 0x18;

/// ACK frame before draft-15.
pub const FRAME_TYPE_ACK_OLD: u8 = 0x0d;

/// ACK frame from draft-15.
pub const FRAME_TYPE_ACK: u8 = 0x1a;

/// ACK frame with ECN counts, from draft-15.
pub const FRAME_TYPE_ACK_ECN: u8 = 0x1b;
