use clap::Args;

use common::share::ShareError;

use crate::cli::op::OpenError;

#[derive(Args, Debug, Clone)]
pub struct Ls;

#[derive(Debug, thiserror::Error)]
pub enum ShareLsError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("share error: {0}")]
    Share(#[from] ShareError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = ShareLsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.service_state().await?;
        let shares = state.shares();

        let listed = shares.list_shares().await?;
        if listed.is_empty() {
            return Ok("No shares found".to_string());
        }

        let mut lines = Vec::with_capacity(listed.len());
        for share in listed {
            let link = shares
                .identifier(share.id)
                .await?
                .map(|identifier| shares.link_for(&identifier).to_string())
                .unwrap_or_else(|| "-".to_string());
            let expires = share
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            lines.push(format!(
                "{} {} {:?} [{}{}] expires={} {}",
                share.id,
                share.kind,
                share.name,
                if share.enabled { "enabled" } else { "disabled" },
                if share.encrypted { ", encrypted" } else { "" },
                expires,
                link,
            ));
        }
        Ok(lines.join("\n"))
    }
}
