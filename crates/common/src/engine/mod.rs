//! Transfer engine seam
//!
//! The swarm transport is a collaborator, not part of the core. The lifecycle
//! manager drives it through [`TransferEngine`]: seed a set of files, add a
//! magnet, read counters, tear a transfer down. Everything the engine reports
//! after that arrives as [`TransferEvent`]s on a flume channel, one channel
//! per transfer.

mod loopback;

use async_trait::async_trait;

use crate::identifier::{IdentifierError, InfoHash};

pub use loopback::{LoopbackEngine, LoopbackHandle, LoopbackSwarm, PIECE_LENGTH};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("nothing to seed")]
    NoFiles,
    #[error("invalid magnet: {0}")]
    Magnet(#[from] IdentifierError),
    #[error("no peers are seeding {0}")]
    NoSeeders(InfoHash),
    #[error("transfer {0} has been destroyed")]
    Destroyed(InfoHash),
    #[error("transfer error: {0}")]
    Transfer(String),
    #[error("engine error: {0}")]
    Default(#[from] anyhow::Error),
}

/// A named file inside a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorrentFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl TorrentFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Something the engine observed on a transfer
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Bytes sent to a peer
    Upload(u64),
    /// Bytes received from a peer
    Download(u64),
    /// A peer wire connected
    Wire,
    /// Trackers returned no peers
    NoPeers,
    /// Every piece is present; files are readable
    Done,
    Error(String),
}

/// Point-in-time counters of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferCounters {
    pub peers: usize,
    /// Bytes per second
    pub upload_speed: f64,
    pub uploaded: u64,
    pub downloaded: u64,
    pub ratio: f64,
}

pub type TransferEvents = flume::Receiver<TransferEvent>;

/// A started transfer: the handle plus the receiving end of its events
#[derive(Debug)]
pub struct Transfer<H> {
    pub handle: H,
    pub events: TransferEvents,
}

#[async_trait]
pub trait TransferHandle: Send + Sync + std::fmt::Debug + Clone + 'static {
    fn info_hash(&self) -> InfoHash;

    fn magnet_uri(&self) -> String;

    fn counters(&self) -> TransferCounters;

    /// The transfer's files, once every piece is present
    fn files(&self) -> Option<Vec<TorrentFile>>;

    /// Leave the swarm. Idempotent.
    async fn destroy(&self);
}

#[async_trait]
pub trait TransferEngine: Send + Sync + std::fmt::Debug + Clone + 'static {
    type Handle: TransferHandle;

    /// Start seeding `files`. The info-hash is a pure function of the files.
    async fn seed(&self, files: Vec<TorrentFile>) -> Result<Transfer<Self::Handle>, EngineError>;

    /// Join the swarm named by `magnet_uri` as a leecher
    async fn add(&self, magnet_uri: &str) -> Result<Transfer<Self::Handle>, EngineError>;
}
