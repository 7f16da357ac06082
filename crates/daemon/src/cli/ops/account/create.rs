use clap::Args;

use common::crypto::VaultError;

use crate::cli::op::OpenError;

#[derive(Args, Debug, Clone)]
pub struct Create {
    #[arg(long)]
    pub username: String,

    #[arg(long, env = "SHUSH_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountCreateError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Create {
    type Error = AccountCreateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.service_state().await?;
        let record = state
            .vault()
            .create_account(&self.username, &self.password)
            .await?;
        Ok(format!("Created account {}", record.username))
    }
}
