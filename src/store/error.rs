use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("schema version must be at least 1, got {0}")]
    InvalidVersion(u32),
    #[error("store unavailable")]
    Unavailable,
}

/// Failure of one correlated write. The transaction has been rolled back.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("store unavailable")]
    StoreUnavailable,
    #[error("transaction failed: {0}")]
    Transaction(#[from] rusqlite::Error),
}

impl From<StoreError> for WriteError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Sqlite(e) => WriteError::Transaction(e),
            // `Io` and `InvalidVersion` only come from `Store::open`.
            StoreError::Io(_) | StoreError::InvalidVersion(_) | StoreError::Unavailable => {
                WriteError::StoreUnavailable
            }
        }
    }
}
