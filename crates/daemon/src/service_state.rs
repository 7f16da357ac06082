use url::Url;

use common::crypto::Vault;
use common::engine::{LoopbackEngine, LoopbackSwarm};
use common::share::ShareManager;

use crate::database::{Database, DatabaseSetupError};
use crate::service_config::Config;

pub type Shares = ShareManager<Database, LoopbackEngine>;

/// Everything a running client owns
#[derive(Clone, Debug)]
pub struct State {
    database: Database,
    vault: Vault<Database>,
    shares: Shares,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        Self::with_swarm(config, LoopbackSwarm::default()).await
    }

    /// Build state whose engine joins an existing swarm, so several clients
    ///  in one process can reach each other's shares
    pub async fn with_swarm(
        config: &Config,
        swarm: LoopbackSwarm,
    ) -> Result<Self, StateSetupError> {
        let sqlite_database_url = match config.sqlite_path {
            Some(ref path) => {
                if !path.exists() {
                    return Err(StateSetupError::DatabasePathDoesNotExist);
                }
                Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)
            }
            // otherwise just set up an in-memory database
            None => Url::parse("sqlite::memory:").map_err(|_| StateSetupError::InvalidDatabaseUrl),
        }?;
        tracing::info!("Database URL: {:?}", sqlite_database_url);
        let database = Database::connect(&sqlite_database_url).await?;

        let engine = LoopbackEngine::new(swarm).with_trackers(config.trackers.clone());
        let shares = ShareManager::new(database.clone(), engine, config.share_manager_config());
        let vault = Vault::new(database.clone());

        Ok(Self {
            database,
            vault,
            shares,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn vault(&self) -> &Vault<Database> {
        &self.vault
    }

    pub fn shares(&self) -> &Shares {
        &self.shares
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        &self.database
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Database path does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
}
