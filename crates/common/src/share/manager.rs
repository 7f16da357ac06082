//! Share lifecycle
//!
//! A share moves `Draft -> Seeding -> {Stopped, Expired, Destroyed}`. Seeding
//! state is never persisted: on start-up every enabled share is re-seeded from
//! its stored metadata and content, so the swarm registry here is disposable.
//!
//! All mutating operations on one share id run one at a time. Different
//! shares never block each other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use super::stats::{StatsRegistry, TransferStats};
use super::types::{ContentBlob, Identifier, NewShare, Share, ShareId, CONTENT_FILENAME};
use super::ShareError;
use crate::crypto::cipher;
use crate::engine::{
    EngineError, TorrentFile, Transfer, TransferEngine, TransferEvent, TransferEvents,
    TransferHandle,
};
use crate::identifier::{
    build_magnet_uri_with_trackers, token_from_path, ShareLink, METADATA_FILENAME, TRACKERS_V1,
};
use crate::store::{ShareStore, StoreError};

/// Origin used to render share links when none is configured
pub const DEFAULT_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone)]
pub struct ShareManagerConfig {
    /// Base of every rendered share link
    pub origin: Url,
    /// Trackers for magnets built on the receiving side. Empty means the
    ///  fixed default list.
    pub trackers: Vec<String>,
}

impl Default for ShareManagerConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid url"),
            trackers: Vec::new(),
        }
    }
}

/// Result of a successful create
#[derive(Debug, Clone)]
pub struct CreatedShare {
    pub share: Share,
    pub identifier: Identifier,
    pub link: ShareLink,
}

/// A share received from the swarm, decrypted if it was encrypted
#[derive(Debug, Clone)]
pub struct FetchedShare {
    pub share: Share,
    pub content: Vec<u8>,
}

/// What `resume_all` did with each enabled share
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeReport {
    pub resumed: Vec<ShareId>,
    pub expired: Vec<ShareId>,
    pub skipped: Vec<ShareId>,
}

enum Resumed {
    Seeding,
    Expired,
}

struct ActiveShare<H> {
    handle: H,
    observer: JoinHandle<()>,
}

struct ShareManagerInner<S, E: TransferEngine> {
    store: S,
    engine: E,
    config: ShareManagerConfig,
    /// share_id -> live swarm handle and its event observer
    active: RwLock<HashMap<ShareId, ActiveShare<E::Handle>>>,
    /// share_id -> pending expiry
    timers: Mutex<HashMap<ShareId, JoinHandle<()>>>,
    /// share_id -> lifecycle lock. Entries are never removed so two callers
    ///  can never end up holding different locks for one id.
    locks: Mutex<HashMap<ShareId, Arc<AsyncMutex<()>>>>,
    stats: StatsRegistry,
}

/// Owns every active share of a process
///
/// Cloning is cheap; clones drive the same registry.
pub struct ShareManager<S: ShareStore, E: TransferEngine> {
    inner: Arc<ShareManagerInner<S, E>>,
}

impl<S: ShareStore, E: TransferEngine> Clone for ShareManager<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: ShareStore, E: TransferEngine> fmt::Debug for ShareManager<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareManager")
            .field("store", &self.inner.store)
            .field("engine", &self.inner.engine)
            .field("origin", &self.inner.config.origin.as_str())
            .field("active", &self.inner.active.read().len())
            .finish()
    }
}

impl<S: ShareStore, E: TransferEngine> ShareManager<S, E> {
    pub fn new(store: S, engine: E, config: ShareManagerConfig) -> Self {
        Self {
            inner: Arc::new(ShareManagerInner {
                store,
                engine,
                config,
                active: RwLock::new(HashMap::new()),
                timers: Mutex::new(HashMap::new()),
                locks: Mutex::new(HashMap::new()),
                stats: StatsRegistry::new(),
            }),
        }
    }

    fn from_inner(inner: Arc<ShareManagerInner<S, E>>) -> Self {
        Self { inner }
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn engine(&self) -> &E {
        &self.inner.engine
    }

    pub fn stats(&self) -> &StatsRegistry {
        &self.inner.stats
    }

    pub fn origin(&self) -> &Url {
        &self.inner.config.origin
    }

    /// Create, persist and start seeding a share.
    ///
    /// Encrypted shares are sealed under `password` before anything is stored.
    ///  If seeding fails the stored rows are removed again.
    pub async fn create_share(
        &self,
        new: NewShare,
        content: Vec<u8>,
        password: Option<&str>,
    ) -> Result<CreatedShare, ShareError> {
        if let Some(at) = new.expires_at {
            if at <= Utc::now() {
                return Err(ShareError::InvalidShare(format!(
                    "expiry {} is in the past",
                    at
                )));
            }
        }

        let (bytes, nonce) = if new.encrypt {
            let password = password.ok_or(ShareError::PasswordRequired)?;
            let sealed = cipher::encrypt(&content, password)?;
            (sealed.ciphertext, Some(sealed.nonce))
        } else {
            (content, None)
        };

        let share = Share {
            id: Uuid::new_v4(),
            name: new.name,
            description: new.description,
            notes: new.notes,
            expires_at: new.expires_at,
            kind: new.kind,
            encrypted: new.encrypt,
            nonce,
            enabled: true,
            self_destruct: Some(new.self_destruct),
        };
        share.validate()?;
        let blob = ContentBlob {
            id: Uuid::new_v4(),
            share_id: share.id,
            bytes,
        };

        let _guard = self.share_lock(share.id).await;
        self.inner.store.insert_share(&share, &blob).await?;

        let identifier = match self.start_seeding(&share, blob.bytes).await {
            Ok(identifier) => identifier,
            Err(e) => {
                tracing::error!(share_id = %share.id, "failed to seed new share: {}", e);
                if let Err(rollback) = self.inner.store.delete_share(share.id).await {
                    tracing::error!(share_id = %share.id, "failed to roll back share: {}", rollback);
                }
                return Err(e);
            }
        };
        self.schedule_expiry(&share);

        let link = self.link_for(&identifier);
        tracing::info!(
            share_id = %share.id,
            info_hash = %identifier.info_hash,
            token = %identifier.short_token,
            "share created"
        );
        Ok(CreatedShare {
            share,
            identifier,
            link,
        })
    }

    /// Re-seed every enabled share from the store.
    ///
    /// Stale registries are cleared first. Shares already past their expiry
    ///  are destroyed instead of seeded. A share that fails to resume is
    ///  logged and skipped; it never stops the others.
    pub async fn resume_all(&self) -> Result<ResumeReport, ShareError> {
        self.stop_all().await;

        let shares = self.inner.store.list_enabled_shares().await?;
        let mut report = ResumeReport::default();
        for share in shares {
            let id = share.id;
            match self.resume_share(share).await {
                Ok(Resumed::Seeding) => report.resumed.push(id),
                Ok(Resumed::Expired) => report.expired.push(id),
                Err(e) => {
                    tracing::warn!(share_id = %id, "skipping share on resume: {}", e);
                    report.skipped.push(id);
                }
            }
        }

        tracing::info!(
            resumed = report.resumed.len(),
            expired = report.expired.len(),
            skipped = report.skipped.len(),
            "resume complete"
        );
        Ok(report)
    }

    async fn resume_share(&self, share: Share) -> Result<Resumed, ShareError> {
        let _guard = self.share_lock(share.id).await;
        if share.is_expired_at(Utc::now()) {
            tracing::info!(share_id = %share.id, "share expired while offline");
            self.destroy_locked(share.id).await?;
            return Ok(Resumed::Expired);
        }
        self.schedule_expiry(&share);
        self.seed_from_store(&share).await?;
        Ok(Resumed::Seeding)
    }

    /// Leave the swarm for `id` and cancel its expiry.
    ///
    /// Returns whether anything was running. Stopping a stopped share is a
    ///  no-op. The share itself stays in the store.
    pub async fn stop_share(&self, id: ShareId) -> bool {
        let _guard = self.share_lock(id).await;
        self.stop_locked(id).await
    }

    /// Stop a share and delete it, its content and its identifier.
    ///
    /// Destroying a share that is already gone succeeds.
    pub async fn destroy_share(&self, id: ShareId) -> Result<(), ShareError> {
        let _guard = self.share_lock(id).await;
        self.destroy_locked(id).await
    }

    /// Persist `enabled` and start or stop seeding to match
    pub async fn set_enabled(&self, id: ShareId, enabled: bool) -> Result<Share, ShareError> {
        let _guard = self.share_lock(id).await;
        let mut share = self
            .inner
            .store
            .get_share(id)
            .await?
            .ok_or(ShareError::NotFound(id))?;

        self.inner
            .store
            .set_enabled(id, enabled)
            .await
            .map_err(|e| match e {
                StoreError::Missing(_) => ShareError::NotFound(id),
                other => other.into(),
            })?;
        share.enabled = enabled;

        if !enabled {
            self.stop_locked(id).await;
            tracing::info!(share_id = %id, "share disabled");
            return Ok(share);
        }

        if self.is_active(&id) {
            return Ok(share);
        }
        if share.is_expired_at(Utc::now()) {
            self.destroy_locked(id).await?;
            return Err(ShareError::NotFound(id));
        }
        self.schedule_expiry(&share);
        self.seed_from_store(&share).await?;
        tracing::info!(share_id = %id, "share enabled");
        Ok(share)
    }

    /// Download a share by link, path or bare token and open it.
    ///
    /// `password` is only needed when the share turns out to be encrypted.
    pub async fn fetch_share(
        &self,
        link_or_token: &str,
        password: Option<&str>,
    ) -> Result<FetchedShare, ShareError> {
        let token = token_from_path(link_or_token)?;
        let info_hash = token.info_hash()?;
        let magnet_uri = build_magnet_uri_with_trackers(&info_hash, &self.trackers());

        tracing::info!(%info_hash, %token, "fetching share");
        let Transfer { handle, events } = self.inner.engine.add(&magnet_uri).await?;
        let result = receive(&handle, events, password).await;
        handle.destroy().await;
        result
    }

    pub async fn list_shares(&self) -> Result<Vec<Share>, ShareError> {
        Ok(self.inner.store.list_shares().await?)
    }

    pub async fn get_share(&self, id: ShareId) -> Result<Share, ShareError> {
        self.inner
            .store
            .get_share(id)
            .await?
            .ok_or(ShareError::NotFound(id))
    }

    pub async fn identifier(&self, id: ShareId) -> Result<Option<Identifier>, ShareError> {
        Ok(self.inner.store.identifier_for(id).await?)
    }

    pub fn link_for(&self, identifier: &Identifier) -> ShareLink {
        ShareLink::new(
            self.inner.config.origin.clone(),
            identifier.short_token.clone(),
        )
    }

    pub fn get_stats(&self, id: &ShareId) -> Option<TransferStats> {
        self.inner.stats.get_stats(id)
    }

    pub fn is_active(&self, id: &ShareId) -> bool {
        self.inner.active.read().contains_key(id)
    }

    pub fn active_shares(&self) -> Vec<ShareId> {
        let mut ids: Vec<ShareId> = self.inner.active.read().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Stop every active share and cancel every timer
    pub async fn shutdown(&self) {
        let stopped = self.stop_all().await;
        tracing::info!(stopped, "share manager shut down");
    }

    async fn stop_all(&self) -> usize {
        let timers: Vec<JoinHandle<()>> =
            self.inner.timers.lock().drain().map(|(_, t)| t).collect();
        for timer in timers {
            timer.abort();
        }

        let active: Vec<(ShareId, ActiveShare<E::Handle>)> =
            self.inner.active.write().drain().collect();
        let stopped = active.len();
        for (_, share) in active {
            share.observer.abort();
            let _ = share.observer.await;
            share.handle.destroy().await;
        }
        self.inner.stats.clear_all();
        stopped
    }

    async fn share_lock(&self, id: ShareId) -> OwnedMutexGuard<()> {
        let lock = self.inner.locks.lock().entry(id).or_default().clone();
        lock.lock_owned().await
    }

    fn trackers(&self) -> Vec<String> {
        if self.inner.config.trackers.is_empty() {
            TRACKERS_V1.iter().map(|t| t.to_string()).collect()
        } else {
            self.inner.config.trackers.clone()
        }
    }

    async fn seed_from_store(&self, share: &Share) -> Result<Identifier, ShareError> {
        share.validate()?;
        let content = self
            .inner
            .store
            .content_for(share.id)
            .await?
            .ok_or_else(|| ShareError::InvalidShare(format!("share {} has no content", share.id)))?;
        self.start_seeding(share, content.bytes).await
    }

    /// Seed the metadata and content files, record the identifier and
    ///  register the handle. Caller holds the share lock.
    async fn start_seeding(&self, share: &Share, content: Vec<u8>) -> Result<Identifier, ShareError> {
        let files = vec![
            TorrentFile::new(METADATA_FILENAME, share.to_metadata()?),
            TorrentFile::new(CONTENT_FILENAME, content),
        ];
        // one full copy of the torrent, metadata included
        let threshold = files.iter().map(|f| f.len() as u64).sum::<u64>().max(1);
        let Transfer { handle, events } = self.inner.engine.seed(files).await?;

        let info_hash = handle.info_hash();
        let identifier = Identifier {
            share_id: share.id,
            info_hash,
            short_token: info_hash.to_token(),
            magnet_uri: handle.magnet_uri(),
        };
        if let Err(e) = self.inner.store.put_identifier(&identifier).await {
            handle.destroy().await;
            return Err(e.into());
        }

        self.inner.stats.on_transfer_event(share.id, handle.counters());
        let observer = self.spawn_observer(
            share.id,
            share.self_destructs().then_some(threshold),
            handle.clone(),
            events,
        );
        let previous = self
            .inner
            .active
            .write()
            .insert(share.id, ActiveShare { handle, observer });
        if let Some(previous) = previous {
            previous.observer.abort();
            previous.handle.destroy().await;
        }

        tracing::info!(share_id = %share.id, %info_hash, "seeding");
        Ok(identifier)
    }

    async fn stop_locked(&self, id: ShareId) -> bool {
        if let Some(timer) = self.inner.timers.lock().remove(&id) {
            timer.abort();
        }

        let active = self.inner.active.write().remove(&id);
        let stopped = match active {
            Some(share) => {
                share.observer.abort();
                let _ = share.observer.await;
                share.handle.destroy().await;
                tracing::info!(share_id = %id, "share stopped");
                true
            }
            None => false,
        };
        self.inner.stats.clear_stats(&id);
        stopped
    }

    async fn destroy_locked(&self, id: ShareId) -> Result<(), ShareError> {
        self.stop_locked(id).await;
        if let Err(e) = self.inner.store.delete_share(id).await {
            tracing::error!(share_id = %id, "failed to delete share: {}", e);
            return Err(e.into());
        }
        tracing::info!(share_id = %id, "share destroyed");
        Ok(())
    }

    /// Arm the one-shot expiry for `share`, replacing any earlier one.
    ///  Never fires before `expires_at`.
    fn schedule_expiry(&self, share: &Share) {
        let Some(expires_at) = share.expires_at else {
            return;
        };
        let id = share.id;
        let delay = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let weak = Arc::downgrade(&self.inner);

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let manager = ShareManager::from_inner(inner);
            // forget ourselves first so the destroy below does not abort us
            manager.inner.timers.lock().remove(&id);
            tracing::info!(share_id = %id, "share expired");
            if let Err(e) = manager.destroy_share(id).await {
                tracing::error!(share_id = %id, "failed to destroy expired share: {}", e);
            }
        });

        if let Some(previous) = self.inner.timers.lock().insert(id, timer) {
            previous.abort();
        }
        tracing::debug!(share_id = %id, ?delay, "expiry scheduled");
    }

    /// One observer per active share. Refreshes stats on every event and
    ///  fires the self-destruct at most once when `self_destruct_at` bytes,
    ///  the whole seeded torrent, have been uploaded.
    fn spawn_observer(
        &self,
        share_id: ShareId,
        self_destruct_at: Option<u64>,
        handle: E::Handle,
        events: TransferEvents,
    ) -> JoinHandle<()> {
        let weak: Weak<ShareManagerInner<S, E>> = Arc::downgrade(&self.inner);
        let stats = self.inner.stats.clone();

        tokio::spawn(async move {
            let mut triggered = false;
            while let Ok(event) = events.recv_async().await {
                if let TransferEvent::Error(reason) = &event {
                    tracing::warn!(%share_id, "transfer error: {}", reason);
                }
                let snapshot = stats.on_transfer_event(share_id, handle.counters());

                let Some(threshold) = self_destruct_at else {
                    continue;
                };
                if triggered || snapshot.uploaded_bytes < threshold {
                    continue;
                }
                triggered = true;
                tracing::info!(
                    %share_id,
                    uploaded = snapshot.uploaded_bytes,
                    threshold,
                    "self-destruct threshold reached"
                );
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let manager = ShareManager::from_inner(inner);
                // destroy aborts this observer, so it runs on its own task
                tokio::spawn(async move {
                    if let Err(e) = manager.destroy_share(share_id).await {
                        tracing::error!(%share_id, "self-destruct failed: {}", e);
                    }
                });
            }
        })
    }
}

/// Wait for a download to finish and open its two files
async fn receive<H: TransferHandle>(
    handle: &H,
    events: TransferEvents,
    password: Option<&str>,
) -> Result<FetchedShare, ShareError> {
    loop {
        match events.recv_async().await {
            Ok(TransferEvent::Done) => break,
            Ok(TransferEvent::Error(reason)) => {
                return Err(EngineError::Transfer(reason).into());
            }
            Ok(_) => continue,
            Err(_) => {
                return Err(EngineError::Transfer("event stream closed".to_string()).into());
            }
        }
    }

    let files = handle
        .files()
        .ok_or_else(|| EngineError::Transfer("files unavailable after done".to_string()))?;
    let find = |name: &str| files.iter().find(|f| f.name == name);
    let (Some(metadata), Some(content)) = (find(METADATA_FILENAME), find(CONTENT_FILENAME)) else {
        return Err(EngineError::Transfer("missing required files".to_string()).into());
    };

    let share = Share::from_metadata(&metadata.bytes)?;
    share.validate()?;
    let content = match (&share.nonce, share.encrypted) {
        (Some(nonce), true) => {
            let password = password.ok_or(ShareError::PasswordRequired)?;
            cipher::decrypt(&content.bytes, nonce, password)?
        }
        _ => content.bytes.clone(),
    };

    tracing::info!(share_id = %share.id, "share received");
    Ok(FetchedShare { share, content })
}
