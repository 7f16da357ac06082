/**
 * Cryptographic primitives.
 *  - Local credential vault (PBKDF2 + AES-GCM probe)
 *  - Payload encryption under a password-derived key
 */
pub mod crypto;
/**
 * Seam to the swarm transport, plus an in-process
 *  loopback engine.
 */
pub mod engine;
/**
 * Info-hashes, short tokens, magnet URIs
 *  and share links.
 */
pub mod identifier;
/**
 * Share types, stats and the lifecycle manager
 *  that seeds, expires and destroys them.
 */
pub mod share;
/**
 * Persistence traits and an in-memory store.
 */
pub mod store;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{Vault, VaultError};
    pub use crate::engine::{LoopbackEngine, LoopbackSwarm, TransferEngine};
    pub use crate::identifier::{expand_token, shorten_info_hash, InfoHash, ShareLink, ShortToken};
    pub use crate::share::{NewShare, Share, ShareError, ShareId, ShareKind, ShareManager};
    pub use crate::store::{AuthStore, MemoryStore, ShareStore};
    pub use crate::version::build_info;
}
