use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use shush_daemon::process::ServiceError;
use shush_daemon::state::{AppState, StateError};
use shush_daemon::{spawn_service, ServiceConfig};

/// Seed every enabled share until interrupted
#[derive(Args, Debug, Clone)]
pub struct Serve {
    /// Directory for log files (defaults to the logs/ directory of the state dir)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Log to stdout only
    #[arg(long, conflicts_with = "log_dir")]
    pub no_log_file: bool,

    /// Seconds between stats reports
    #[arg(long, default_value_t = 30)]
    pub stats_interval: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("state error: {0}")]
    StateError(#[from] StateError),

    #[error("service failed: {0}")]
    Failed(#[from] ServiceError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Serve {
    type Error = ServeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        let log_dir = if self.no_log_file {
            None
        } else {
            Some(self.log_dir.clone().unwrap_or(state.logs_path.clone()))
        };
        let config = ServiceConfig {
            log_dir,
            stats_interval: Duration::from_secs(self.stats_interval.max(1)),
            ..ServiceConfig::from_app_state(&state)?
        };

        spawn_service(&config).await?;
        Ok("shush stopped".to_string())
    }
}
