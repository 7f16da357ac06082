use clap::{Args, Subcommand};

pub mod create;

use crate::cli::op::Op;

crate::command_enum! {
    (Create, create::Create),
}

pub type AccountCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Account {
    #[command(subcommand)]
    pub command: AccountCommand,
}

#[async_trait::async_trait]
impl Op for Account {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
