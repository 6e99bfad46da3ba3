//! Keying material for packet protection.
//!
//! Each direction of a connection owns an AEAD key, an IV, and a
//! header-protection key. The handshake layer installs these before any
//! protected packet is produced; for Initial packets they are derived
//! from the destination connection id alone, so both endpoints can
//! protect packets before the handshake completes.
//!
//! Suite: ChaCha20-Poly1305 for the payload (12-byte nonce, 16-byte tag)
//! and a raw ChaCha20 keystream for the header-protection mask. The
//! sample's first four bytes seed the block counter, the remaining twelve
//! the nonce. Key material is zeroized on drop.

use chacha20::ChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroize;

use crate::core::{
    AEAD_IV_SIZE, AEAD_KEY_SIZE, AEAD_TAG_SIZE, CryptoError, HP_KEY_SIZE, HP_MASK_SIZE,
    HP_SAMPLE_SIZE,
};
use crate::packet::{ConnectionId, PacketNumber};

/// Salt for the initial-secret extraction, fixed for this draft family.
const INITIAL_SALT: [u8; 20] = [
    0x9c, 0x10, 0x8f, 0x98, 0x52, 0x0a, 0x5c, 0x5c, 0x32, 0x96, 0x8e, 0x95, 0x0e, 0x8a, 0x2c,
    0x5f, 0xe0, 0x6d, 0x6c, 0x38,
];

/// HKDF-Expand with the wire-format label structure:
/// output length (u16), label length (u8), "QUIC " plus the label.
fn expand_label(hk: &Hkdf<Sha256>, label: &str, out: &mut [u8]) {
    let mut info = Vec::with_capacity(3 + 5 + label.len());
    info.extend_from_slice(&(out.len() as u16).to_be_bytes());
    info.push((5 + label.len()) as u8);
    info.extend_from_slice(b"QUIC ");
    info.extend_from_slice(label.as_bytes());
    hk.expand(&info, out).expect("output length is in range");
}

/// One direction's packet-protection keys.
pub struct DirectionalKeys {
    key: [u8; AEAD_KEY_SIZE],
    iv: [u8; AEAD_IV_SIZE],
    hp: [u8; HP_KEY_SIZE],
}

impl DirectionalKeys {
    /// Assemble keys the handshake layer derived elsewhere.
    pub fn from_parts(
        key: [u8; AEAD_KEY_SIZE],
        iv: [u8; AEAD_IV_SIZE],
        hp: [u8; HP_KEY_SIZE],
    ) -> Self {
        Self { key, iv, hp }
    }

    fn from_secret(secret: &[u8; 32]) -> Self {
        let hk = Hkdf::<Sha256>::from_prk(secret).expect("secret is one hash long");
        let mut key = [0u8; AEAD_KEY_SIZE];
        let mut iv = [0u8; AEAD_IV_SIZE];
        let mut hp = [0u8; HP_KEY_SIZE];
        expand_label(&hk, "key", &mut key);
        expand_label(&hk, "iv", &mut iv);
        expand_label(&hk, "hp", &mut hp);
        Self { key, iv, hp }
    }

    /// Seal `plaintext` with the nonce for `pn`, binding `aad`.
    ///
    /// Returns the ciphertext with the 16-byte tag appended.
    pub fn seal(
        &self,
        pn: PacketNumber,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&self.key));
        cipher
            .encrypt(
                chacha20poly1305::Nonce::from_slice(&self.nonce(pn)),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::SealFailed)
    }

    /// Open `ciphertext` (tag included) with the nonce for `pn`.
    pub fn open(
        &self,
        pn: PacketNumber,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < AEAD_TAG_SIZE {
            return Err(CryptoError::OpenFailed);
        }
        let cipher = ChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&self.key));
        cipher
            .decrypt(
                chacha20poly1305::Nonce::from_slice(&self.nonce(pn)),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::OpenFailed)
    }

    /// Header-protection mask for a 16-byte ciphertext sample.
    ///
    /// One first-byte lane followed by four packet-number lanes.
    pub fn header_protection_mask(&self, sample: &[u8]) -> [u8; HP_MASK_SIZE] {
        debug_assert!(sample.len() >= HP_SAMPLE_SIZE);
        let counter = u32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
        let mut cipher = ChaCha20::new(
            chacha20::Key::from_slice(&self.hp),
            chacha20::Nonce::from_slice(&sample[4..HP_SAMPLE_SIZE]),
        );
        cipher.seek(u64::from(counter) * 64);
        let mut mask = [0u8; HP_MASK_SIZE];
        cipher.apply_keystream(&mut mask);
        mask
    }

    /// Nonce = IV XOR the packet number, left-padded and big-endian.
    fn nonce(&self, pn: PacketNumber) -> [u8; AEAD_IV_SIZE] {
        let mut nonce = self.iv;
        for (n, b) in nonce[AEAD_IV_SIZE - 8..].iter_mut().zip(pn.to_be_bytes()) {
            *n ^= b;
        }
        nonce
    }
}

impl Drop for DirectionalKeys {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
        self.hp.zeroize();
    }
}

/// Keying material for both directions of a connection.
///
/// Held by the connection and borrowed read-only by the codec; replaced
/// only on key update.
pub struct ConnectionSecrets {
    client: DirectionalKeys,
    server: DirectionalKeys,
}

impl ConnectionSecrets {
    /// Install keys produced by the handshake layer.
    pub fn new(client: DirectionalKeys, server: DirectionalKeys) -> Self {
        Self { client, server }
    }

    /// Derive the Initial secrets from the destination connection id.
    pub fn initial(dcid: &ConnectionId) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(&INITIAL_SALT), dcid.as_bytes());
        let mut client_secret = [0u8; 32];
        let mut server_secret = [0u8; 32];
        expand_label(&hk, "client in", &mut client_secret);
        expand_label(&hk, "server in", &mut server_secret);
        let secrets = Self {
            client: DirectionalKeys::from_secret(&client_secret),
            server: DirectionalKeys::from_secret(&server_secret),
        };
        client_secret.zeroize();
        server_secret.zeroize();
        secrets
    }

    /// Keys protecting client-to-server packets.
    pub fn client(&self) -> &DirectionalKeys {
        &self.client
    }

    /// Keys protecting server-to-client packets.
    pub fn server(&self) -> &DirectionalKeys {
        &self.server
    }
}
