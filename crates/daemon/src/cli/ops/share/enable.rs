use clap::Args;
use uuid::Uuid;

use super::toggle::{toggle, ShareToggleError};

/// Resume seeding a disabled share
#[derive(Args, Debug, Clone)]
pub struct Enable {
    pub id: Uuid,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Enable {
    type Error = ShareToggleError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        toggle(ctx, self.id, true).await
    }
}
