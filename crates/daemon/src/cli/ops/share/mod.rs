use clap::{Args, Subcommand};

pub mod create;
pub mod disable;
pub mod enable;
pub mod ls;
pub mod rm;
mod toggle;

use crate::cli::op::Op;

crate::command_enum! {
    (Create, create::Create),
    (Ls, ls::Ls),
    (Rm, rm::Rm),
    (Disable, disable::Disable),
    (Enable, enable::Enable),
}

pub type ShareCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Share {
    #[command(subcommand)]
    pub command: ShareCommand,
}

#[async_trait::async_trait]
impl Op for Share {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
