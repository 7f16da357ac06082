//! Shares and their lifecycle
//!
//! A share is a named payload (a URL or a file) that is optionally
//! encrypted, seeded into the swarm as two files (`metadata.json` and
//! `content.bin`) and distributed as a short link to its info-hash.

mod error;
mod manager;
mod stats;
mod types;

pub use error::ShareError;
pub use manager::{
    CreatedShare, FetchedShare, ResumeReport, ShareManager, ShareManagerConfig, DEFAULT_ORIGIN,
};
pub use stats::{StatsRegistry, TransferStats};
pub use types::{ContentBlob, Identifier, NewShare, Share, ShareId, ShareKind, CONTENT_FILENAME};
