//! Common error types for Naturae

use thiserror::Error;

/// Common result type for Naturae operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the library and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON column or document could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Caller is not allowed to touch the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unique constraint or state conflict
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upload would exceed the user's storage allowance
    #[error("Storage quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: i64, available: i64 },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when a database error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}
