//! Error taxonomy shared by the storage, domain and API layers

/// Errors raised by academia operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The entity does not exist for the resolved identity
    #[error("{0}")]
    NotFound(String),

    /// Input failed validation (marks out of range, missing fields, ...)
    #[error("{0}")]
    Validation(String),

    /// Bad credentials or a missing/invalid bearer token
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but the role may not perform the operation
    #[error("{0}")]
    Forbidden(String),

    /// A uniqueness constraint would be violated
    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Error::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Error::Forbidden(msg.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Other(e.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Other(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
