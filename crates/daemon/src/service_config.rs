use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use common::share::ShareManagerConfig;

use crate::state::{AppState, StateError};

#[derive(Debug, Clone)]
pub struct Config {
    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // share configuration
    /// base of every rendered share link
    pub origin: Url,
    /// trackers for magnets built when fetching,
    ///  empty means the built-in list
    pub trackers: Vec<String>,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
    /// How often `serve` logs transfer stats for active shares
    pub stats_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let shares = ShareManagerConfig::default();
        Self {
            sqlite_path: None,
            origin: shares.origin,
            trackers: shares.trackers,
            log_level: tracing::Level::INFO,
            log_dir: None,
            stats_interval: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Resolve the runtime config for an initialized state directory
    pub fn from_app_state(state: &AppState) -> Result<Self, StateError> {
        Ok(Self {
            sqlite_path: Some(state.db_path.clone()),
            origin: state.config.origin.clone(),
            trackers: state.config.trackers.clone(),
            log_level: state.config.log_level()?,
            log_dir: None,
            ..Default::default()
        })
    }

    pub fn share_manager_config(&self) -> ShareManagerConfig {
        ShareManagerConfig {
            origin: self.origin.clone(),
            trackers: self.trackers.clone(),
        }
    }
}
