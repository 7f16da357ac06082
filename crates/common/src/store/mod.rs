//! Persistence seam for accounts and shares
//!
//! The core never talks to a database directly. It drives the two traits
//! below, which mirror the four logical tables of the store: `auth`, `links`,
//! `magnets` and `content`. Multi-table writes (`insert_share`,
//! `delete_share`) are single trait calls so an implementation can make them
//! atomic.

mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::crypto::AuthRecord;
use crate::share::{ContentBlob, Identifier, Share, ShareId};

pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique key is already taken
    #[error("record already exists: {0}")]
    Duplicate(String),
    /// The referenced record does not exist
    #[error("record not found: {0}")]
    Missing(String),
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

#[async_trait]
pub trait AuthStore: Send + Sync + std::fmt::Debug + Clone + 'static {
    async fn get_auth(&self, username: &str) -> Result<Option<AuthRecord>, StoreError>;

    /// Insert a new record.
    ///
    /// Must fail with `StoreError::Duplicate` if the username is taken.
    async fn insert_auth(&self, record: &AuthRecord) -> Result<(), StoreError>;

    /// Record a successful sign-in. The only mutation an auth record sees.
    async fn touch_sign_in(&self, username: &str, at: DateTime<Utc>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ShareStore: Send + Sync + std::fmt::Debug + Clone + 'static {
    /// Persist a share together with its content blob
    ///
    /// Either both rows are written or neither is.
    async fn insert_share(&self, share: &Share, content: &ContentBlob) -> Result<(), StoreError>;

    async fn get_share(&self, id: ShareId) -> Result<Option<Share>, StoreError>;

    /// Every share, enabled or not
    async fn list_shares(&self) -> Result<Vec<Share>, StoreError>;

    /// Shares with `enabled = true`
    async fn list_enabled_shares(&self) -> Result<Vec<Share>, StoreError> {
        Ok(self
            .list_shares()
            .await?
            .into_iter()
            .filter(|share| share.enabled)
            .collect())
    }

    /// Fails with `StoreError::Missing` if the share does not exist
    async fn set_enabled(&self, id: ShareId, enabled: bool) -> Result<(), StoreError>;

    async fn content_for(&self, share_id: ShareId) -> Result<Option<ContentBlob>, StoreError>;

    /// Insert or replace the identifier for a share
    async fn put_identifier(&self, identifier: &Identifier) -> Result<(), StoreError>;

    async fn identifier_for(&self, share_id: ShareId) -> Result<Option<Identifier>, StoreError>;

    /// Delete a share, its content and its identifier as one cascade.
    ///
    /// Deleting a share that does not exist is not an error.
    async fn delete_share(&self, id: ShareId) -> Result<(), StoreError>;
}
