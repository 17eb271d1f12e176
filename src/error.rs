use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Fetch for school '{school_id}' timed out after {timeout:?}")]
    Timeout { school_id: String, timeout: Duration },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum RankingError {
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RankingResult<T> = Result<T, RankingError>;
