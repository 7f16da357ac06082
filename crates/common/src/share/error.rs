use super::ShareId;
use crate::crypto::CipherError;
use crate::engine::EngineError;
use crate::identifier::IdentifierError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("share not found: {0}")]
    NotFound(ShareId),
    /// Wrong password or tampered content; the two are never told apart
    #[error("authentication failure")]
    AuthenticationFailure,
    #[error("a password is required for encrypted shares")]
    PasswordRequired,
    #[error("invalid share: {0}")]
    InvalidShare(String),
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    #[error("transfer engine failure: {0}")]
    EngineFailure(#[from] EngineError),
    #[error("store failure: {0}")]
    StoreFailure(#[from] StoreError),
    #[error("cipher error: {0}")]
    Cipher(CipherError),
}

impl From<CipherError> for ShareError {
    fn from(error: CipherError) -> Self {
        match error {
            CipherError::AuthenticationFailure => ShareError::AuthenticationFailure,
            CipherError::InvalidNonce(reason) => ShareError::InvalidShare(reason),
            other => ShareError::Cipher(other),
        }
    }
}

impl From<serde_json::Error> for ShareError {
    fn from(error: serde_json::Error) -> Self {
        ShareError::InvalidShare(format!("malformed metadata: {}", error))
    }
}
