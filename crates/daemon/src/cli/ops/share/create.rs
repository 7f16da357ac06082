use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::Args;
use url::Url;

use common::crypto::VaultError;
use common::share::{NewShare, ShareError, ShareKind};

use crate::cli::op::OpenError;

#[derive(Args, Debug, Clone)]
pub struct Create {
    #[arg(long)]
    pub username: String,

    /// Account password, also used to encrypt the share with --encrypt
    #[arg(long, env = "SHUSH_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// File to share
    #[arg(long, conflicts_with = "url", required_unless_present = "url")]
    pub file: Option<PathBuf>,

    /// URL to share
    #[arg(long)]
    pub url: Option<Url>,

    #[arg(long)]
    pub name: String,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long)]
    pub notes: Option<String>,

    /// Destroy the share this many seconds from now
    #[arg(long)]
    pub expires_in: Option<u32>,

    #[arg(long)]
    pub encrypt: bool,

    /// Destroy the share once a full copy has been uploaded
    #[arg(long)]
    pub self_destruct: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ShareCreateError {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("invalid username or password")]
    NotAuthenticated,
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("either --file or --url must be provided")]
    NoContent,
    #[error("share error: {0}")]
    Share(#[from] ShareError),
}

impl Create {
    async fn content(&self) -> Result<(ShareKind, Vec<u8>), ShareCreateError> {
        match (&self.file, &self.url) {
            (Some(path), _) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ShareCreateError::Read(path.clone(), e))?;
                Ok((ShareKind::File, bytes))
            }
            (None, Some(url)) => Ok((ShareKind::Url, url.as_str().as_bytes().to_vec())),
            (None, None) => Err(ShareCreateError::NoContent),
        }
    }
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Create {
    type Error = ShareCreateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = ctx.service_state().await?;
        if !state
            .vault()
            .authenticate(&self.username, &self.password)
            .await?
        {
            return Err(ShareCreateError::NotAuthenticated);
        }

        let (kind, content) = self.content().await?;
        let mut new = NewShare::new(&self.name, kind)
            .description(&self.description)
            .encrypted(self.encrypt)
            .self_destruct(self.self_destruct);
        if let Some(notes) = &self.notes {
            new = new.notes(notes);
        }
        if let Some(secs) = self.expires_in {
            new = new.expires_at(Utc::now() + Duration::seconds(i64::from(secs)));
        }

        let shares = state.shares();
        let created = shares
            .create_share(new, content, Some(&self.password))
            .await;
        // seeding resumes under `shush serve`
        shares.shutdown().await;
        let created = created?;

        Ok(format!(
            "Created share {}\n  link: {}\n  magnet: {}",
            created.share.id, created.link, created.identifier.magnet_uri
        ))
    }
}
