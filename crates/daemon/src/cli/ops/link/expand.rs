use clap::Args;

use common::identifier::{build_magnet_uri, token_from_path, IdentifierError};

/// Print the info-hash and magnet behind a share link or token
#[derive(Args, Debug, Clone)]
pub struct Expand {
    /// Share link, path or bare token
    pub link: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Expand {
    type Error = IdentifierError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let token = token_from_path(&self.link)?;
        let info_hash = token.info_hash()?;
        Ok(format!("{}\n{}", info_hash, build_magnet_uri(&info_hash)))
    }
}
