//! Session frame protection.
//!
//! With the `crypto` feature the frames are sealed with
//! ChaCha20-Poly1305 under keys derived from the pairing secret via
//! HKDF-SHA256, one key per direction. Without the feature a reversible
//! masking scheme stands in so the framing paths stay testable.
//!
//! WARNING: the fallback provides NO security. Production builds must
//! enable the `crypto` feature.

use crate::error::{Result, WeaveError};

/// Bytes in a session key.
pub const KEY_LEN: usize = 32;

/// HKDF info labels for the two directions.
const INFO_I2R: &[u8] = b"weave-session-i2r";
const INFO_R2I: &[u8] = b"weave-session-r2i";

/// Directional key pair derived from one pairing secret.
#[derive(Clone)]
#[cfg_attr(feature = "crypto", derive(zeroize::Zeroize, zeroize::ZeroizeOnDrop))]
pub struct SessionKeys {
    /// Protects initiator-to-responder frames.
    pub i2r: [u8; KEY_LEN],
    /// Protects responder-to-initiator frames.
    pub r2i: [u8; KEY_LEN],
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("SessionKeys").finish_non_exhaustive()
    }
}

/// Frame protection seam injected into the session manager.
pub trait SessionCrypto {
    /// Derive the directional key pair from a pairing secret.
    fn derive_keys(&self, secret: &[u8]) -> Result<SessionKeys>;

    /// Seal a payload; `aad` is authenticated but not encrypted.
    fn seal(&self, key: &[u8; KEY_LEN], counter: u32, aad: &[u8], plaintext: &[u8])
        -> Result<Vec<u8>>;

    /// Open a sealed payload, verifying `aad`.
    fn open(&self, key: &[u8; KEY_LEN], counter: u32, aad: &[u8], sealed: &[u8])
        -> Result<Vec<u8>>;
}

/// Default frame protection (AEAD with the `crypto` feature).
#[derive(Debug, Default, Clone, Copy)]
pub struct AeadSessionCrypto;

impl AeadSessionCrypto {
    /// Create the default protection.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "crypto")]
impl SessionCrypto for AeadSessionCrypto {
    fn derive_keys(&self, secret: &[u8]) -> Result<SessionKeys> {
        use hkdf::Hkdf;
        use sha2::Sha256;

        let hk = Hkdf::<Sha256>::new(None, secret);
        let mut i2r = [0u8; KEY_LEN];
        let mut r2i = [0u8; KEY_LEN];
        hk.expand(INFO_I2R, &mut i2r)
            .map_err(|e| WeaveError::CryptoFailure(e.to_string()))?;
        hk.expand(INFO_R2I, &mut r2i)
            .map_err(|e| WeaveError::CryptoFailure(e.to_string()))?;
        Ok(SessionKeys { i2r, r2i })
    }

    fn seal(
        &self,
        key: &[u8; KEY_LEN],
        counter: u32,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        use chacha20poly1305::aead::{Aead, KeyInit, Payload};
        use chacha20poly1305::{ChaCha20Poly1305, Nonce};

        let cipher = ChaCha20Poly1305::new(key.into());
        let nonce = counter_nonce(counter);
        cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| WeaveError::CryptoFailure("seal failed".into()))
    }

    fn open(
        &self,
        key: &[u8; KEY_LEN],
        counter: u32,
        aad: &[u8],
        sealed: &[u8],
    ) -> Result<Vec<u8>> {
        use chacha20poly1305::aead::{Aead, KeyInit, Payload};
        use chacha20poly1305::{ChaCha20Poly1305, Nonce};

        let cipher = ChaCha20Poly1305::new(key.into());
        let nonce = counter_nonce(counter);
        cipher
            .decrypt(Nonce::from_slice(&nonce), Payload { msg: sealed, aad })
            .map_err(|_| WeaveError::CryptoFailure("authentication failed".into()))
    }
}

/// NOT SECURE: reversible masking used only without the `crypto` feature.
#[cfg(not(feature = "crypto"))]
impl SessionCrypto for AeadSessionCrypto {
    fn derive_keys(&self, secret: &[u8]) -> Result<SessionKeys> {
        let mut i2r = [0u8; KEY_LEN];
        let mut r2i = [0u8; KEY_LEN];
        for (i, byte) in secret.iter().enumerate() {
            i2r[i % KEY_LEN] ^= byte;
            r2i[i % KEY_LEN] ^= byte.wrapping_add(1);
        }
        for (label, key) in [(INFO_I2R, &mut i2r), (INFO_R2I, &mut r2i)] {
            for (i, byte) in label.iter().enumerate() {
                key[i % KEY_LEN] ^= byte;
            }
        }
        Ok(SessionKeys { i2r, r2i })
    }

    fn seal(
        &self,
        key: &[u8; KEY_LEN],
        counter: u32,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(plaintext.len() + 4);
        for (i, byte) in plaintext.iter().enumerate() {
            out.push(byte ^ key[i % KEY_LEN] ^ counter.to_le_bytes()[i % 4]);
        }
        // Checksum over AAD + plaintext stands in for the auth tag.
        out.extend_from_slice(&mask_checksum(key, counter, aad, plaintext).to_le_bytes());
        Ok(out)
    }

    fn open(
        &self,
        key: &[u8; KEY_LEN],
        counter: u32,
        aad: &[u8],
        sealed: &[u8],
    ) -> Result<Vec<u8>> {
        if sealed.len() < 4 {
            return Err(WeaveError::CryptoFailure("frame too short".into()));
        }
        let (body, tag) = sealed.split_at(sealed.len() - 4);
        let mut plaintext = Vec::with_capacity(body.len());
        for (i, byte) in body.iter().enumerate() {
            plaintext.push(byte ^ key[i % KEY_LEN] ^ counter.to_le_bytes()[i % 4]);
        }
        let expected = mask_checksum(key, counter, aad, &plaintext).to_le_bytes();
        if tag != expected {
            return Err(WeaveError::CryptoFailure("authentication failed".into()));
        }
        Ok(plaintext)
    }
}

#[cfg(not(feature = "crypto"))]
fn mask_checksum(key: &[u8; KEY_LEN], counter: u32, aad: &[u8], plaintext: &[u8]) -> u32 {
    let mut sum = counter ^ 0x5749_5245;
    for chunk in [&key[..], aad, plaintext] {
        for byte in chunk {
            sum = sum.rotate_left(5) ^ u32::from(*byte);
        }
    }
    sum
}

/// 96-bit nonce: counter in the low bytes, zero elsewhere.
///
/// Safe because each direction has its own key and the send counter
/// never repeats within a session.
#[cfg(feature = "crypto")]
fn counter_nonce(counter: u32) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(&counter.to_le_bytes());
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_keys_directional() {
        let crypto = AeadSessionCrypto::new();
        let keys = crypto.derive_keys(b"pairing secret").unwrap();
        assert_ne!(keys.i2r, keys.r2i);

        // Same secret, same keys.
        let again = crypto.derive_keys(b"pairing secret").unwrap();
        assert_eq!(keys.i2r, again.i2r);

        // Different secret, different keys.
        let other = crypto.derive_keys(b"other secret").unwrap();
        assert_ne!(keys.i2r, other.i2r);
    }

    #[test]
    fn test_seal_open_round_trip() {
        let crypto = AeadSessionCrypto::new();
        let keys = crypto.derive_keys(b"s").unwrap();
        let aad = b"header";
        let sealed = crypto.seal(&keys.i2r, 7, aad, b"payload").unwrap();
        assert_ne!(&sealed[..7.min(sealed.len())], b"payload");
        let opened = crypto.open(&keys.i2r, 7, aad, &sealed).unwrap();
        assert_eq!(opened, b"payload");
    }

    #[test]
    fn test_open_rejects_tampered_aad() {
        let crypto = AeadSessionCrypto::new();
        let keys = crypto.derive_keys(b"s").unwrap();
        let sealed = crypto.seal(&keys.i2r, 7, b"header", b"payload").unwrap();
        assert!(matches!(
            crypto.open(&keys.i2r, 7, b"tampered", &sealed),
            Err(WeaveError::CryptoFailure(_))
        ));
    }

    #[test]
    fn test_open_rejects_wrong_counter() {
        let crypto = AeadSessionCrypto::new();
        let keys = crypto.derive_keys(b"s").unwrap();
        let sealed = crypto.seal(&keys.i2r, 7, b"h", b"payload").unwrap();
        assert!(crypto.open(&keys.i2r, 8, b"h", &sealed).is_err());
    }

    #[test]
    fn test_open_rejects_wrong_direction_key() {
        let crypto = AeadSessionCrypto::new();
        let keys = crypto.derive_keys(b"s").unwrap();
        let sealed = crypto.seal(&keys.i2r, 1, b"h", b"payload").unwrap();
        assert!(crypto.open(&keys.r2i, 1, b"h", &sealed).is_err());
    }
}
