//! Cryptographic primitives for shush
//!
//! Two independent keyspaces live here:
//!
//! - **Credential vault** ([`Vault`]): PBKDF2-SHA256 (100k rounds) derives an
//!   AES-256-GCM key that seals a random probe. Knowing the password is proven
//!   by opening the probe and matching its SHA-256 digest. Nothing else is
//!   ever encrypted under this key.
//! - **Content cipher** ([`cipher`]): share payloads are sealed with
//!   XChaCha20-Poly1305 under SHA-512(password)[..32] and a fresh 24-byte
//!   nonce per seal. Decryption failures never say whether the password was
//!   wrong or the bytes were tampered with.
//!
//! Passwords are never persisted. Loss of a password is unrecoverable.

pub mod cipher;
mod vault;

pub use cipher::{CipherError, Nonce, PayloadKey, Sealed};
pub use vault::{
    AuthRecord, Session, Vault, VaultError, IV_SIZE, KDF_ITERATIONS, KDF_SALT_SIZE, PROBE_SIZE,
};
