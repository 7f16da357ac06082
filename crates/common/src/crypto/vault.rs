//! Local credential verification
//!
//! An account is never stored as a password hash. Signup instead derives an
//! AES-256-GCM key from the password (PBKDF2-SHA256, 100k rounds, random salt),
//! seals a random 16-byte probe under it and keeps the SHA-256 of the probe.
//! Signing in re-derives the key, opens the probe and compares its digest.
//! Both steps must succeed; nothing about which one failed leaks to the caller.

use std::fmt;
use std::sync::Arc;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::store::{AuthStore, StoreError};

/// PBKDF2 rounds used for the account key
pub const KDF_ITERATIONS: u32 = 100_000;
/// Size of the per-account KDF salt
pub const KDF_SALT_SIZE: usize = 16;
/// Size of the AES-GCM nonce used to seal the probe
pub const IV_SIZE: usize = 12;
/// Size of the random probe value
pub const PROBE_SIZE: usize = 16;
/// Size of the derived account key (256 bits)
pub const AUTH_KEY_SIZE: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("invalid username")]
    InvalidUsername,
    #[error("failed to gather randomness: {0}")]
    Random(#[from] getrandom::Error),
    #[error("probe encryption failed")]
    Seal,
    #[error("key derivation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// The persisted proof that a password is correct
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub username: String,
    pub kdf_salt: [u8; KDF_SALT_SIZE],
    pub iv: [u8; IV_SIZE],
    /// AES-256-GCM ciphertext of the probe, tag included
    pub encrypted_probe: Vec<u8>,
    /// SHA-256 of the plaintext probe
    pub probe_hash: [u8; 32],
    pub last_sign_in: DateTime<Utc>,
}

impl fmt::Debug for AuthRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthRecord")
            .field("username", &self.username)
            .field("last_sign_in", &self.last_sign_in)
            .finish_non_exhaustive()
    }
}

/// An authenticated session. Holds the password, not the record, so later
///  payload encryption can derive its own key from it.
#[derive(Clone)]
pub struct Session {
    username: String,
    password: Zeroizing<String>,
}

impl Session {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

fn random_array<const N: usize>() -> Result<[u8; N], getrandom::Error> {
    let mut buff = [0u8; N];
    getrandom::getrandom(&mut buff)?;
    Ok(buff)
}

/// PBKDF2-HMAC-SHA256 over the password. Slow on purpose; call off the runtime.
fn derive_auth_key(password: &str, salt: &[u8; KDF_SALT_SIZE]) -> Zeroizing<[u8; AUTH_KEY_SIZE]> {
    let mut key = Zeroizing::new([0u8; AUTH_KEY_SIZE]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut key[..]);
    key
}

async fn derive_auth_key_blocking(
    password: &str,
    salt: [u8; KDF_SALT_SIZE],
) -> Result<Zeroizing<[u8; AUTH_KEY_SIZE]>, tokio::task::JoinError> {
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || derive_auth_key(&password, &salt)).await
}

fn probe_cipher(key: &[u8; AUTH_KEY_SIZE]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

/// Credential vault over an [`AuthStore`]
///
/// Cloning is cheap; clones share the same session.
#[derive(Debug, Clone)]
pub struct Vault<S: AuthStore> {
    store: S,
    session: Arc<RwLock<Option<Session>>>,
}

impl<S: AuthStore> Vault<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            session: Arc::new(RwLock::new(None)),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create an account for `username`.
    ///
    /// # Errors
    ///
    /// Fails with [`VaultError::DuplicateUser`] if the username is taken. An
    ///  existing record is never overwritten.
    pub async fn create_account(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthRecord, VaultError> {
        if username.trim().is_empty() {
            return Err(VaultError::InvalidUsername);
        }
        if self.store.get_auth(username).await?.is_some() {
            return Err(VaultError::DuplicateUser(username.to_string()));
        }

        let kdf_salt = random_array::<KDF_SALT_SIZE>()?;
        let iv = random_array::<IV_SIZE>()?;
        let probe = Zeroizing::new(random_array::<PROBE_SIZE>()?);

        let key = derive_auth_key_blocking(password, kdf_salt).await?;
        let encrypted_probe = probe_cipher(&key)
            .encrypt(Nonce::from_slice(&iv), &probe[..])
            .map_err(|_| VaultError::Seal)?;

        let record = AuthRecord {
            username: username.to_string(),
            kdf_salt,
            iv,
            encrypted_probe,
            probe_hash: Sha256::digest(&probe[..]).into(),
            last_sign_in: Utc::now(),
        };

        self.store.insert_auth(&record).await.map_err(|e| match e {
            StoreError::Duplicate(name) => VaultError::DuplicateUser(name),
            other => VaultError::Store(other),
        })?;

        tracing::info!(username = %record.username, "account created");
        Ok(record)
    }

    /// Check `password` against the stored record for `username`.
    ///
    /// Returns `Ok(true)` and opens a session only if the probe decrypts and
    ///  its digest matches. A missing user, a failed open and a digest
    ///  mismatch all return `Ok(false)` and leave the record untouched.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<bool, VaultError> {
        let Some(record) = self.store.get_auth(username).await? else {
            tracing::debug!(%username, "authentication failed");
            return Ok(false);
        };

        let key = derive_auth_key_blocking(password, record.kdf_salt).await?;
        if !verify_probe(&record, &key) {
            tracing::debug!(%username, "authentication failed");
            return Ok(false);
        }

        if let Err(e) = self.store.touch_sign_in(username, Utc::now()).await {
            tracing::warn!(%username, "failed to record sign-in time: {}", e);
        }

        *self.session.write() = Some(Session {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
        });
        tracing::info!(%username, "signed in");
        Ok(true)
    }

    /// Clear the session. Safe to call when signed out.
    pub fn sign_out(&self) {
        if let Some(session) = self.session.write().take() {
            tracing::info!(username = %session.username, "signed out");
        }
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.read().is_some()
    }
}

fn verify_probe(record: &AuthRecord, key: &[u8; AUTH_KEY_SIZE]) -> bool {
    let Ok(probe) = probe_cipher(key).decrypt(
        Nonce::from_slice(&record.iv),
        record.encrypted_probe.as_slice(),
    ) else {
        return false;
    };
    let probe = Zeroizing::new(probe);
    let digest = Sha256::digest(probe.as_slice());
    digest.as_slice().ct_eq(&record.probe_hash).into()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::MemoryStore;

    fn vault() -> Vault<MemoryStore> {
        Vault::new(MemoryStore::new())
    }

    #[tokio::test]
    async fn test_signup_then_authenticate() {
        let vault = vault();
        vault.create_account("alice", "secret123").await.unwrap();

        assert!(vault.authenticate("alice", "secret123").await.unwrap());
        assert!(vault.is_signed_in());
        assert_eq!(vault.session().unwrap().password(), "secret123");

        vault.sign_out();
        assert!(!vault.authenticate("alice", "wrong").await.unwrap());
        assert!(!vault.is_signed_in());
    }

    #[tokio::test]
    async fn test_record_shape() {
        let vault = vault();
        let record = vault.create_account("alice", "secret123").await.unwrap();
        assert_eq!(record.encrypted_probe.len(), PROBE_SIZE + 16);

        let key = derive_auth_key("secret123", &record.kdf_salt);
        assert!(verify_probe(&record, &key));
        let wrong = derive_auth_key("secret124", &record.kdf_salt);
        assert!(!verify_probe(&record, &wrong));
    }

    #[tokio::test]
    async fn test_failed_attempt_does_not_mutate_record() {
        let vault = vault();
        vault.create_account("alice", "secret123").await.unwrap();
        let before = vault.store().get_auth("alice").await.unwrap().unwrap();

        assert!(!vault.authenticate("alice", "nope").await.unwrap());

        let after = vault.store().get_auth("alice").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_unknown_user_is_false() {
        let vault = vault();
        assert!(!vault.authenticate("nobody", "pw").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_user_rejected() {
        let vault = vault();
        let original = vault.create_account("alice", "one").await.unwrap();
        let result = vault.create_account("alice", "two").await;
        assert!(matches!(result, Err(VaultError::DuplicateUser(_))));

        let stored = vault.store().get_auth("alice").await.unwrap().unwrap();
        assert_eq!(stored.kdf_salt, original.kdf_salt);
        assert!(vault.authenticate("alice", "one").await.unwrap());
    }

    #[tokio::test]
    async fn test_tampered_hash_fails_even_if_probe_opens() {
        let store = MemoryStore::new();
        let vault = Vault::new(store.clone());
        let mut record = vault.create_account("alice", "pw").await.unwrap();
        record.probe_hash[0] ^= 0xff;
        record.username = "mallory".to_string();
        store.insert_auth(&record).await.unwrap();

        assert!(!vault.authenticate("mallory", "pw").await.unwrap());
    }

    #[tokio::test]
    async fn test_sign_out_is_idempotent() {
        let vault = vault();
        vault.sign_out();
        vault.create_account("alice", "pw").await.unwrap();
        assert!(vault.authenticate("alice", "pw").await.unwrap());
        vault.sign_out();
        vault.sign_out();
        assert!(vault.session().is_none());
    }

    #[tokio::test]
    async fn test_empty_username_rejected() {
        let result = vault().create_account("  ", "pw").await;
        assert!(matches!(result, Err(VaultError::InvalidUsername)));
    }
}
