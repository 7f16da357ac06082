use clap::Args;

use common::identifier::{shorten_info_hash, IdentifierError};

/// Print the short token for a hex info-hash
#[derive(Args, Debug, Clone)]
pub struct Shorten {
    pub info_hash: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Shorten {
    type Error = IdentifierError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        shorten_info_hash(&self.info_hash)
    }
}
