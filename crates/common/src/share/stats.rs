//! Latest transfer stats per share
//!
//! Only the most recent snapshot is kept. Entries appear on the first engine
//! event for a share and disappear when its transfer is torn down.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use super::ShareId;
use crate::engine::TransferCounters;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStats {
    pub peer_count: usize,
    /// Bytes per second
    pub upload_rate: f64,
    pub uploaded_bytes: u64,
    pub ratio: f64,
}

impl From<TransferCounters> for TransferStats {
    fn from(counters: TransferCounters) -> Self {
        Self {
            peer_count: counters.peers,
            upload_rate: counters.upload_speed,
            uploaded_bytes: counters.uploaded,
            ratio: counters.ratio,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsRegistry {
    stats: Arc<RwLock<HashMap<ShareId, TransferStats>>>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `share_id` with one derived from `counters`
    pub fn on_transfer_event(&self, share_id: ShareId, counters: TransferCounters) -> TransferStats {
        let stats = TransferStats::from(counters);
        self.stats.write().insert(share_id, stats);
        tracing::trace!(%share_id, ?stats, "stats updated");
        stats
    }

    pub fn get_stats(&self, share_id: &ShareId) -> Option<TransferStats> {
        self.stats.read().get(share_id).copied()
    }

    pub fn clear_stats(&self, share_id: &ShareId) {
        self.stats.write().remove(share_id);
    }

    pub fn clear_all(&self) {
        self.stats.write().clear();
    }

    pub fn snapshot(&self) -> HashMap<ShareId, TransferStats> {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_latest_snapshot_wins() {
        let registry = StatsRegistry::new();
        let id = Uuid::new_v4();
        assert!(registry.get_stats(&id).is_none());

        registry.on_transfer_event(
            id,
            TransferCounters {
                peers: 1,
                uploaded: 10,
                ..Default::default()
            },
        );
        registry.on_transfer_event(
            id,
            TransferCounters {
                peers: 2,
                uploaded: 30,
                upload_speed: 5.0,
                ratio: 0.5,
                ..Default::default()
            },
        );

        let stats = registry.get_stats(&id).unwrap();
        assert_eq!(stats.peer_count, 2);
        assert_eq!(stats.uploaded_bytes, 30);
        assert_eq!(stats.upload_rate, 5.0);
        assert_eq!(stats.ratio, 0.5);
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_clear() {
        let registry = StatsRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.on_transfer_event(a, TransferCounters::default());
        registry.on_transfer_event(b, TransferCounters::default());

        registry.clear_stats(&a);
        registry.clear_stats(&a);
        assert!(registry.get_stats(&a).is_none());
        assert!(registry.get_stats(&b).is_some());

        registry.clear_all();
        assert!(registry.snapshot().is_empty());
    }
}
