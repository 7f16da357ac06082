use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AuthStore, ShareStore, StoreError};
use crate::crypto::AuthRecord;
use crate::share::{ContentBlob, Identifier, Share, ShareId};

/// In-memory store using HashMaps
///
/// All tables live behind a single lock, so the multi-table operations are
///  atomic with respect to every other call.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    auth: HashMap<String, AuthRecord>,
    /// links: share_id -> share
    links: HashMap<ShareId, Share>,
    /// magnets: share_id -> identifier
    magnets: HashMap<ShareId, Identifier>,
    /// content: share_id -> blob
    content: HashMap<ShareId, ContentBlob>,
    /// shares whose content reads fail, for exercising error paths
    poisoned_content: HashSet<ShareId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner.read().map_err(|e| {
            StoreError::Backend(anyhow::anyhow!("failed to acquire read lock: {}", e))
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner.write().map_err(|e| {
            StoreError::Backend(anyhow::anyhow!("failed to acquire write lock: {}", e))
        })
    }

    /// Make every subsequent `content_for(share_id)` fail with a backend error
    pub fn poison_content(&self, share_id: ShareId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.poisoned_content.insert(share_id);
        }
    }

    /// Drop the content row for a share while leaving the share in place
    pub fn remove_content(&self, share_id: ShareId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.content.remove(&share_id);
        }
    }

    /// Number of rows across the share tables, for asserting cascades
    pub fn share_row_count(&self) -> usize {
        self.inner
            .read()
            .map(|inner| inner.links.len() + inner.magnets.len() + inner.content.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn get_auth(&self, username: &str) -> Result<Option<AuthRecord>, StoreError> {
        Ok(self.read()?.auth.get(username).cloned())
    }

    async fn insert_auth(&self, record: &AuthRecord) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.auth.contains_key(&record.username) {
            return Err(StoreError::Duplicate(record.username.clone()));
        }
        inner.auth.insert(record.username.clone(), record.clone());
        Ok(())
    }

    async fn touch_sign_in(&self, username: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let record = inner
            .auth
            .get_mut(username)
            .ok_or_else(|| StoreError::Missing(username.to_string()))?;
        record.last_sign_in = at;
        Ok(())
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn insert_share(&self, share: &Share, content: &ContentBlob) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.links.contains_key(&share.id) {
            return Err(StoreError::Duplicate(share.id.to_string()));
        }
        inner.links.insert(share.id, share.clone());
        inner.content.insert(share.id, content.clone());
        Ok(())
    }

    async fn get_share(&self, id: ShareId) -> Result<Option<Share>, StoreError> {
        Ok(self.read()?.links.get(&id).cloned())
    }

    async fn list_shares(&self) -> Result<Vec<Share>, StoreError> {
        let mut shares: Vec<Share> = self.read()?.links.values().cloned().collect();
        shares.sort_by_key(|share| share.id);
        Ok(shares)
    }

    async fn set_enabled(&self, id: ShareId, enabled: bool) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let share = inner
            .links
            .get_mut(&id)
            .ok_or_else(|| StoreError::Missing(id.to_string()))?;
        share.enabled = enabled;
        Ok(())
    }

    async fn content_for(&self, share_id: ShareId) -> Result<Option<ContentBlob>, StoreError> {
        let inner = self.read()?;
        if inner.poisoned_content.contains(&share_id) {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "content for {} is unreadable",
                share_id
            )));
        }
        Ok(inner.content.get(&share_id).cloned())
    }

    async fn put_identifier(&self, identifier: &Identifier) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if !inner.links.contains_key(&identifier.share_id) {
            return Err(StoreError::Missing(identifier.share_id.to_string()));
        }
        inner.magnets.insert(identifier.share_id, identifier.clone());
        Ok(())
    }

    async fn identifier_for(&self, share_id: ShareId) -> Result<Option<Identifier>, StoreError> {
        Ok(self.read()?.magnets.get(&share_id).cloned())
    }

    async fn delete_share(&self, id: ShareId) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.content.remove(&id);
        inner.magnets.remove(&id);
        inner.links.remove(&id);
        Ok(())
    }
}
