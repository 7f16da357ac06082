use clap::{Args, Subcommand};

pub mod expand;
pub mod shorten;

use crate::cli::op::Op;

crate::command_enum! {
    (Expand, expand::Expand),
    (Shorten, shorten::Shorten),
}

pub type LinkCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Link {
    #[command(subcommand)]
    pub command: LinkCommand,
}

#[async_trait::async_trait]
impl Op for Link {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
