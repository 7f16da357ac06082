use clap::Args;
use uuid::Uuid;

use common::share::ShareError;

use crate::cli::op::OpenError;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum ShareRmError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("share error: {0}")]
    Share(#[from] ShareError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = ShareRmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.service_state().await?;
        // surfaces NotFound for an unknown id; destroy itself never does
        state.shares().get_share(self.id).await?;
        state.shares().destroy_share(self.id).await?;
        Ok(format!("Destroyed share {}", self.id))
    }
}
