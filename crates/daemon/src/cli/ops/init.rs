use clap::Args;
use url::Url;

use shush_daemon::database::{Database, DatabaseSetupError};
use shush_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Origin used to render share links (e.g. https://shush.example.com)
    #[arg(long)]
    pub origin: Option<Url>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseSetupError),

    #[error("invalid database path")]
    InvalidDatabasePath,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(origin) = &self.origin {
            config.origin = origin.clone();
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        // run migrations now so the first real command starts on a ready schema
        let db_url = Url::parse(&format!("sqlite://{}", state.db_path.display()))
            .map_err(|_| InitError::InvalidDatabasePath)?;
        let db = Database::connect(&db_url).await?;
        db.close().await;

        Ok(format!(
            "Initialized shush directory at {}\n  config: {}\n  database: {}\n  origin: {}",
            state.shush_dir.display(),
            state.config_path.display(),
            state.db_path.display(),
            state.config.origin,
        ))
    }
}
