use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("location access not granted")]
    AuthorizationDenied,
    #[error("session already collecting")]
    AlreadyCollecting,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("failed to spawn writer: {0}")]
    Worker(#[from] std::io::Error),
}
