use uuid::Uuid;

use common::share::ShareError;

use crate::cli::op::{OpContext, OpenError};

#[derive(Debug, thiserror::Error)]
pub enum ShareToggleError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("share error: {0}")]
    Share(#[from] ShareError),
}

pub async fn toggle(ctx: &OpContext, id: Uuid, enabled: bool) -> Result<String, ShareToggleError> {
    let state = ctx.service_state().await?;
    let shares = state.shares();
    let result = shares.set_enabled(id, enabled).await;
    shares.shutdown().await;

    let share = result?;
    let status = if share.enabled { "enabled" } else { "disabled" };
    Ok(format!("Share {} {}", share.id, status))
}
