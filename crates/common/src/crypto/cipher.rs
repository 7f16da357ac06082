//! Payload encryption using XChaCha20-Poly1305
//!
//! Share content is sealed under a key derived from the owner's password with
//! a single fast hash. This keyspace is deliberately separate from the
//! credential vault, which runs a slow KDF over a per-account salt.
//!
//! Every seal draws a fresh 24-byte nonce. The nonce is not secret and travels
//! alongside the ciphertext in the share metadata.

use std::fmt;
use std::ops::Deref;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    Key, XChaCha20Poly1305, XNonce,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an XChaCha20-Poly1305 nonce in bytes
pub const NONCE_SIZE: usize = 24;
/// Size of the symmetric payload key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;
/// Size of the Poly1305 tag appended to every ciphertext
pub const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    /// Wrong password or tampered ciphertext. AEAD cannot tell these apart.
    #[error("authentication failure: wrong password or corrupted data")]
    AuthenticationFailure,
    #[error("failed to gather randomness: {0}")]
    Random(#[from] getrandom::Error),
    #[error("invalid nonce: {0}")]
    InvalidNonce(String),
}

/// A 256-bit key for sealing share payloads
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PayloadKey([u8; KEY_SIZE]);

impl fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PayloadKey(..)")
    }
}

impl Deref for PayloadKey {
    type Target = [u8; KEY_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PayloadKey {
    /// Derive the payload key from a password.
    ///
    /// The first 32 bytes of SHA-512(password). This is a fast one-way hash,
    /// not a KDF, and must never be used for authentication.
    pub fn derive(password: &str) -> Self {
        let digest = Sha512::digest(password.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest[..KEY_SIZE]);
        Self(key)
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

/// Per-encryption nonce, rendered as base64 when serialized
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    pub fn generate() -> Result<Self, CipherError> {
        let mut bytes = [0u8; NONCE_SIZE];
        getrandom::getrandom(&mut bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CipherError::InvalidNonce(e.to_string()))?;
        Self::try_from(bytes.as_slice())
    }
}

impl From<[u8; NONCE_SIZE]> for Nonce {
    fn from(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Nonce {
    type Error = CipherError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; NONCE_SIZE] = bytes.try_into().map_err(|_| {
            CipherError::InvalidNonce(format!(
                "expected {} bytes, got {}",
                NONCE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({})", self.to_base64())
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        Nonce::from_base64(&encoded).map_err(serde::de::Error::custom)
    }
}

/// Output of a seal: the nonce it was sealed under and the tagged ciphertext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: Nonce,
    pub ciphertext: Vec<u8>,
}

/// Seal `payload` under a key derived from `password` and a fresh nonce.
///
/// The whole payload is sealed as one unit, so memory use is linear in its size.
pub fn encrypt(payload: &[u8], password: &str) -> Result<Sealed, CipherError> {
    let key = PayloadKey::derive(password);
    let nonce = Nonce::generate()?;
    let ciphertext = key
        .cipher()
        .encrypt(XNonce::from_slice(nonce.as_bytes()), payload)
        .map_err(|_| CipherError::AuthenticationFailure)?;
    Ok(Sealed { nonce, ciphertext })
}

/// Open a sealed payload.
///
/// # Errors
///
/// Returns [`CipherError::AuthenticationFailure`] for a wrong password, a
/// wrong nonce, or any modification of the ciphertext.
pub fn decrypt(ciphertext: &[u8], nonce: &Nonce, password: &str) -> Result<Vec<u8>, CipherError> {
    if ciphertext.len() < TAG_SIZE {
        return Err(CipherError::AuthenticationFailure);
    }
    let key = PayloadKey::derive(password);
    key.cipher()
        .decrypt(XNonce::from_slice(nonce.as_bytes()), ciphertext)
        .map_err(|_| CipherError::AuthenticationFailure)
}
