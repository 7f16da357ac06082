use clap::Args;
use uuid::Uuid;

use super::toggle::{toggle, ShareToggleError};

/// Stop seeding a share without deleting it
#[derive(Args, Debug, Clone)]
pub struct Disable {
    pub id: Uuid,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Disable {
    type Error = ShareToggleError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        toggle(ctx, self.id, false).await
    }
}
