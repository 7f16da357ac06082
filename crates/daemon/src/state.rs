use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use common::share::ShareManagerConfig;

pub const APP_NAME: &str = "shush";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base of rendered share links
    #[serde(default = "default_origin")]
    pub origin: Url,
    /// Log level for `serve`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Trackers appended to magnets built for fetching.
    ///  Empty means the built-in list.
    #[serde(default)]
    pub trackers: Vec<String>,
}

fn default_origin() -> Url {
    ShareManagerConfig::default().origin
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            log_level: default_log_level(),
            trackers: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn log_level(&self) -> Result<tracing::Level, StateError> {
        self.log_level
            .parse()
            .map_err(|_| StateError::InvalidConfig(format!("unknown log level: {}", self.log_level)))
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the shush directory (~/.shush)
    pub shush_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the log directory
    pub logs_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the shush directory path (custom or default ~/.shush)
    pub fn shush_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    pub fn exists(custom_path: Option<PathBuf>) -> Result<bool, StateError> {
        let shush_dir = Self::shush_dir(custom_path)?;
        Ok(shush_dir.exists())
    }

    /// Initialize a new shush state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let shush_dir = Self::shush_dir(custom_path)?;
        if shush_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&shush_dir)?;

        let logs_path = shush_dir.join(LOGS_DIR_NAME);
        fs::create_dir_all(&logs_path)?;

        let config = config.unwrap_or_default();
        let config_path = shush_dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, toml::to_string_pretty(&config)?)?;

        // migrations run on first connect
        let db_path = shush_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            shush_dir,
            db_path,
            logs_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the shush directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let shush_dir = Self::shush_dir(custom_path)?;
        if !shush_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = shush_dir.join(DB_FILE_NAME);
        let logs_path = shush_dir.join(LOGS_DIR_NAME);
        let config_path = shush_dir.join(CONFIG_FILE_NAME);

        if !db_path.exists() {
            return Err(StateError::MissingFile(DB_FILE_NAME.to_string()));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            shush_dir,
            db_path,
            logs_path,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("shush directory not initialized. Run 'shush init' first")]
    NotInitialized,

    #[error("shush directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("shush");

        let config = AppConfig {
            origin: Url::parse("https://share.example.com").unwrap(),
            ..Default::default()
        };
        let state = AppState::init(Some(dir.clone()), Some(config.clone())).unwrap();
        assert!(state.db_path.exists());
        assert!(state.logs_path.is_dir());

        let loaded = AppState::load(Some(dir.clone())).unwrap();
        assert_eq!(loaded.config, config);
        assert_eq!(loaded.db_path, state.db_path);

        assert!(matches!(
            AppState::init(Some(dir), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let tmp = tempfile::tempdir().unwrap();
        let result = AppState::load(Some(tmp.path().join("missing")));
        assert!(matches!(result, Err(StateError::NotInitialized)));
    }

    #[test]
    fn test_load_missing_db() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("shush");
        let state = AppState::init(Some(dir.clone()), None).unwrap();
        fs::remove_file(&state.db_path).unwrap();

        let result = AppState::load(Some(dir));
        assert!(matches!(result, Err(StateError::MissingFile(f)) if f == DB_FILE_NAME));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("log_level = \"debug\"").unwrap();
        assert_eq!(config.origin.as_str(), "http://localhost:5173/");
        assert_eq!(config.log_level().unwrap(), tracing::Level::DEBUG);
        assert!(config.trackers.is_empty());

        let bad = AppConfig {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(matches!(bad.log_level(), Err(StateError::InvalidConfig(_))));
    }
}
