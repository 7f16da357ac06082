//! Shared helpers for share integration tests
#![allow(dead_code)]

use common::engine::{LoopbackEngine, LoopbackSwarm};
use common::share::{ShareManager, ShareManagerConfig};
use common::store::MemoryStore;

pub type Manager = ShareManager<MemoryStore, LoopbackEngine>;

/// A client with its own store, joined to `swarm`
pub fn client(swarm: &LoopbackSwarm) -> (Manager, MemoryStore) {
    let store = MemoryStore::new();
    let manager = ShareManager::new(
        store.clone(),
        LoopbackEngine::new(swarm.clone()),
        ShareManagerConfig::default(),
    );
    (manager, store)
}

/// A sender and a receiver on a fresh swarm
pub fn pair() -> (Manager, MemoryStore, Manager, LoopbackSwarm) {
    let swarm = LoopbackSwarm::default();
    let (sender, store) = client(&swarm);
    let (receiver, _) = client(&swarm);
    (sender, store, receiver, swarm)
}
