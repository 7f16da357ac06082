//! In-process transfer engine
//!
//! Engines built over the same [`LoopbackSwarm`] see each other's seeds. A
//! leecher that adds a magnet is served by the first live seeder of that
//! info-hash; the transfer is replayed piece by piece as Wire, Upload,
//! Download and Done events, so observers see the same event stream a real
//! swarm produces.
//!
//! Info-hashes are real BitTorrent v1 hashes: SHA-1 over the bencoded
//! multi-file `info` dictionary with 16 KiB pieces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use sha1::{Digest, Sha1};

use super::{
    EngineError, TorrentFile, Transfer, TransferCounters, TransferEngine, TransferEvent,
    TransferHandle,
};
use crate::identifier::{build_magnet_uri_with_trackers, parse_magnet, InfoHash, TRACKERS_V1};

/// Piece size used for hashing and for replaying transfers
pub const PIECE_LENGTH: usize = 16 * 1024;

/// Simulated time between two pieces on the wire
const PIECE_INTERVAL: Duration = Duration::from_millis(10);

/// Registry of live seeders shared between engines
#[derive(Debug, Clone, Default)]
pub struct LoopbackSwarm {
    seeders: Arc<RwLock<HashMap<InfoHash, Vec<LoopbackHandle>>>>,
}

impl LoopbackSwarm {
    pub fn new() -> Self {
        Self::default()
    }

    fn join(&self, handle: LoopbackHandle) {
        self.seeders
            .write()
            .entry(handle.info_hash())
            .or_default()
            .push(handle);
    }

    fn leave(&self, handle: &LoopbackHandle) {
        let mut seeders = self.seeders.write();
        let info_hash = handle.info_hash();
        if let Some(entries) = seeders.get_mut(&info_hash) {
            entries.retain(|entry| !Arc::ptr_eq(&entry.inner, &handle.inner));
            if entries.is_empty() {
                seeders.remove(&info_hash);
            }
        }
    }

    fn seeder(&self, info_hash: &InfoHash) -> Option<LoopbackHandle> {
        self.seeders
            .read()
            .get(info_hash)
            .and_then(|entries| entries.iter().find(|h| !h.is_destroyed()).cloned())
    }

    /// Number of live seeders of `info_hash`
    pub fn seeder_count(&self, info_hash: &InfoHash) -> usize {
        self.seeders
            .read()
            .get(info_hash)
            .map(|entries| entries.iter().filter(|h| !h.is_destroyed()).count())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct LoopbackEngine {
    swarm: LoopbackSwarm,
    trackers: Vec<String>,
}

impl LoopbackEngine {
    pub fn new(swarm: LoopbackSwarm) -> Self {
        Self {
            swarm,
            trackers: TRACKERS_V1.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Override the tracker list written into magnet URIs
    pub fn with_trackers(mut self, trackers: Vec<String>) -> Self {
        if !trackers.is_empty() {
            self.trackers = trackers;
        }
        self
    }

    pub fn swarm(&self) -> &LoopbackSwarm {
        &self.swarm
    }
}

#[async_trait]
impl TransferEngine for LoopbackEngine {
    type Handle = LoopbackHandle;

    async fn seed(&self, files: Vec<TorrentFile>) -> Result<Transfer<Self::Handle>, EngineError> {
        if files.is_empty() {
            return Err(EngineError::NoFiles);
        }
        let info_hash = info_hash(&files);
        let magnet_uri = build_magnet_uri_with_trackers(&info_hash, &self.trackers);
        let length = files.iter().map(|f| f.len() as u64).sum();

        let (tx, rx) = flume::unbounded();
        let handle = LoopbackHandle::new(
            info_hash,
            magnet_uri,
            length,
            Some(files),
            tx,
            Some(self.swarm.clone()),
        );
        self.swarm.join(handle.clone());

        tracing::debug!(%info_hash, "loopback seeding");
        handle.emit(TransferEvent::NoPeers);
        Ok(Transfer { handle, events: rx })
    }

    async fn add(&self, magnet_uri: &str) -> Result<Transfer<Self::Handle>, EngineError> {
        let info_hash = parse_magnet(magnet_uri)?;
        let seeder = self
            .swarm
            .seeder(&info_hash)
            .ok_or(EngineError::NoSeeders(info_hash))?;

        let (tx, rx) = flume::unbounded();
        let handle = LoopbackHandle::new(
            info_hash,
            magnet_uri.to_string(),
            seeder.inner.length,
            None,
            tx,
            None,
        );

        tracing::debug!(%info_hash, "loopback leeching");
        tokio::spawn(replay(seeder, handle.clone()));
        Ok(Transfer { handle, events: rx })
    }
}

#[derive(Debug)]
struct HandleInner {
    info_hash: InfoHash,
    magnet_uri: String,
    length: u64,
    files: RwLock<Option<Vec<TorrentFile>>>,
    counters: Mutex<TransferCounters>,
    destroyed: AtomicBool,
    events: flume::Sender<TransferEvent>,
    /// Set for seeders; cleared when the handle leaves
    swarm: Mutex<Option<LoopbackSwarm>>,
}

#[derive(Debug, Clone)]
pub struct LoopbackHandle {
    inner: Arc<HandleInner>,
}

impl LoopbackHandle {
    fn new(
        info_hash: InfoHash,
        magnet_uri: String,
        length: u64,
        files: Option<Vec<TorrentFile>>,
        events: flume::Sender<TransferEvent>,
        swarm: Option<LoopbackSwarm>,
    ) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                info_hash,
                magnet_uri,
                length,
                files: RwLock::new(files),
                counters: Mutex::new(TransferCounters::default()),
                destroyed: AtomicBool::new(false),
                events,
                swarm: Mutex::new(swarm),
            }),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    fn emit(&self, event: TransferEvent) {
        if self.is_destroyed() {
            return;
        }
        // a dropped receiver just means nobody is watching
        let _ = self.inner.events.send(event);
    }

    fn update(&self, f: impl FnOnce(&mut TransferCounters)) {
        let mut counters = self.inner.counters.lock();
        f(&mut counters);
        let denominator = if counters.downloaded > 0 {
            counters.downloaded
        } else {
            self.inner.length
        };
        counters.ratio = if denominator == 0 {
            0.0
        } else {
            counters.uploaded as f64 / denominator as f64
        };
    }
}

#[async_trait]
impl TransferHandle for LoopbackHandle {
    fn info_hash(&self) -> InfoHash {
        self.inner.info_hash
    }

    fn magnet_uri(&self) -> String {
        self.inner.magnet_uri.clone()
    }

    fn counters(&self) -> TransferCounters {
        *self.inner.counters.lock()
    }

    fn files(&self) -> Option<Vec<TorrentFile>> {
        self.inner.files.read().clone()
    }

    async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(swarm) = self.inner.swarm.lock().take() {
            swarm.leave(self);
        }
        tracing::debug!(info_hash = %self.inner.info_hash, "loopback transfer destroyed");
    }
}

/// Stream the seeder's files to `leecher` one piece at a time
async fn replay(seeder: LoopbackHandle, leecher: LoopbackHandle) {
    let Some(files) = seeder.files() else {
        leecher.emit(TransferEvent::Error("seeder has no files".to_string()));
        return;
    };

    seeder.update(|c| c.peers += 1);
    leecher.update(|c| c.peers += 1);
    seeder.emit(TransferEvent::Wire);
    leecher.emit(TransferEvent::Wire);

    let speed = PIECE_LENGTH as f64 / PIECE_INTERVAL.as_secs_f64();
    let mut remaining = seeder.inner.length;
    let mut outcome = Ok(());
    while remaining > 0 {
        tokio::time::sleep(PIECE_INTERVAL).await;
        if leecher.is_destroyed() {
            outcome = Err(None);
            break;
        }
        if seeder.is_destroyed() {
            outcome = Err(Some("seeder left the swarm".to_string()));
            break;
        }
        let piece = remaining.min(PIECE_LENGTH as u64);
        remaining -= piece;

        seeder.update(|c| {
            c.uploaded += piece;
            c.upload_speed = speed;
        });
        seeder.emit(TransferEvent::Upload(piece));
        leecher.update(|c| c.downloaded += piece);
        leecher.emit(TransferEvent::Download(piece));
    }

    seeder.update(|c| {
        c.peers = c.peers.saturating_sub(1);
        c.upload_speed = 0.0;
    });
    leecher.update(|c| c.peers = c.peers.saturating_sub(1));

    match outcome {
        Ok(()) => {
            *leecher.inner.files.write() = Some(files);
            leecher.emit(TransferEvent::Done);
        }
        Err(Some(reason)) => leecher.emit(TransferEvent::Error(reason)),
        Err(None) => {}
    }
}

/// BitTorrent v1 info-hash of a multi-file torrent holding `files`
fn info_hash(files: &[TorrentFile]) -> InfoHash {
    let mut pieces = Vec::new();
    let mut piece = Sha1::new();
    let mut filled = 0usize;
    for file in files {
        let mut bytes = file.bytes.as_slice();
        while !bytes.is_empty() {
            let take = (PIECE_LENGTH - filled).min(bytes.len());
            piece.update(&bytes[..take]);
            filled += take;
            bytes = &bytes[take..];
            if filled == PIECE_LENGTH {
                pieces.extend_from_slice(&piece.finalize_reset());
                filled = 0;
            }
        }
    }
    if filled > 0 {
        pieces.extend_from_slice(&piece.finalize());
    }

    let name = files.first().map(|f| f.name.as_str()).unwrap_or_default();
    let mut info = Vec::new();
    info.push(b'd');
    bencode::bytes(&mut info, b"files");
    info.push(b'l');
    for file in files {
        info.push(b'd');
        bencode::bytes(&mut info, b"length");
        bencode::int(&mut info, file.len() as u64);
        bencode::bytes(&mut info, b"path");
        info.push(b'l');
        bencode::bytes(&mut info, file.name.as_bytes());
        info.push(b'e');
        info.push(b'e');
    }
    info.push(b'e');
    bencode::bytes(&mut info, b"name");
    bencode::bytes(&mut info, name.as_bytes());
    bencode::bytes(&mut info, b"piece length");
    bencode::int(&mut info, PIECE_LENGTH as u64);
    bencode::bytes(&mut info, b"pieces");
    bencode::bytes(&mut info, &pieces);
    info.push(b'e');

    let digest: [u8; 20] = Sha1::digest(&info).into();
    InfoHash::from(digest)
}

mod bencode {
    pub fn bytes(out: &mut Vec<u8>, value: &[u8]) {
        out.extend_from_slice(value.len().to_string().as_bytes());
        out.push(b':');
        out.extend_from_slice(value);
    }

    pub fn int(out: &mut Vec<u8>, value: u64) {
        out.push(b'i');
        out.extend_from_slice(value.to_string().as_bytes());
        out.push(b'e');
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn files(content: &[u8]) -> Vec<TorrentFile> {
        vec![
            TorrentFile::new("metadata.json", b"{\"name\":\"a\"}".to_vec()),
            TorrentFile::new("content.bin", content.to_vec()),
        ]
    }

    #[test]
    fn test_info_hash_is_deterministic() {
        let a = info_hash(&files(b"hello"));
        let b = info_hash(&files(b"hello"));
        let c = info_hash(&files(b"hellp"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_info_hash_single_file_matches_known_layout() {
        // d5:filesld6:lengthi0e4:pathl1:aeee4:name1:a12:piece lengthi16384e6:pieces0:e
        let expected: [u8; 20] = Sha1::digest(
            b"d5:filesld6:lengthi0e4:pathl1:aeee4:name1:a12:piece lengthi16384e6:pieces0:e",
        )
        .into();
        let hash = info_hash(&[TorrentFile::new("a", Vec::new())]);
        assert_eq!(hash, InfoHash::from(expected));
    }

    #[test]
    fn test_pieces_span_file_boundaries() {
        let big = vec![7u8; PIECE_LENGTH + 10];
        let split = vec![
            TorrentFile::new("x", big[..5].to_vec()),
            TorrentFile::new("y", big[5..].to_vec()),
        ];
        let other = vec![
            TorrentFile::new("x", big[..6].to_vec()),
            TorrentFile::new("y", big[6..].to_vec()),
        ];
        // same pieces, different file lengths
        assert_ne!(info_hash(&split), info_hash(&other));
    }

    #[tokio::test(start_paused = true)]
    async fn test_seed_then_add_transfers_files() {
        let swarm = LoopbackSwarm::new();
        let seeder_engine = LoopbackEngine::new(swarm.clone());
        let leecher_engine = LoopbackEngine::new(swarm.clone());

        let content = vec![1u8; PIECE_LENGTH * 2 + 3];
        let seeded = seeder_engine.seed(files(&content)).await.unwrap();
        assert_eq!(swarm.seeder_count(&seeded.handle.info_hash()), 1);

        let leech = leecher_engine
            .add(&seeded.handle.magnet_uri())
            .await
            .unwrap();
        assert!(leech.handle.files().is_none());

        loop {
            match leech.events.recv_async().await.unwrap() {
                TransferEvent::Done => break,
                TransferEvent::Error(e) => panic!("transfer failed: {}", e),
                _ => {}
            }
        }

        let received = leech.handle.files().unwrap();
        assert_eq!(received, files(&content));

        let total = files(&content).iter().map(|f| f.len() as u64).sum::<u64>();
        let counters = seeded.handle.counters();
        assert_eq!(counters.uploaded, total);
        assert_eq!(counters.ratio, 1.0);
        assert_eq!(leech.handle.counters().downloaded, total);

        let mut uploaded = 0;
        while let Ok(event) = seeded.events.try_recv() {
            if let TransferEvent::Upload(n) = event {
                uploaded += n;
            }
        }
        assert_eq!(uploaded, total);
    }

    #[tokio::test]
    async fn test_add_without_seeders_fails() {
        let engine = LoopbackEngine::new(LoopbackSwarm::new());
        let hash = info_hash(&files(b"nobody"));
        let magnet = build_magnet_uri_with_trackers(&hash, TRACKERS_V1);
        let result = engine.add(&magnet).await;
        assert!(matches!(result, Err(EngineError::NoSeeders(h)) if h == hash));
    }

    #[tokio::test]
    async fn test_destroy_leaves_swarm() {
        let swarm = LoopbackSwarm::new();
        let engine = LoopbackEngine::new(swarm.clone());
        let seeded = engine.seed(files(b"bye")).await.unwrap();
        let hash = seeded.handle.info_hash();

        seeded.handle.destroy().await;
        seeded.handle.destroy().await;
        assert!(seeded.handle.is_destroyed());
        assert_eq!(swarm.seeder_count(&hash), 0);

        let magnet = seeded.handle.magnet_uri();
        assert!(matches!(
            engine.add(&magnet).await,
            Err(EngineError::NoSeeders(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_empty_seed() {
        let engine = LoopbackEngine::new(LoopbackSwarm::new());
        assert!(matches!(
            engine.seed(Vec::new()).await,
            Err(EngineError::NoFiles)
        ));
    }
}
