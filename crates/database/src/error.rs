use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid connection parameter: {0}")]
    InvalidParameter(String),

    #[error("Database error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Timed out after {0:?} while connecting to the database.")]
    ConnectTimeout(Duration),
}
