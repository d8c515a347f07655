use thiserror::Error;

/// Classified domain errors surfaced to the transport layer.
///
/// Every variant carries a human-readable reason. The REST facade maps the
/// variant to a status code; callers match exhaustively instead of probing
/// error types dynamically.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn entity_not_found() -> Self {
        Self::NotFound("tender or bid not found".to_string())
    }

    pub fn version_not_found() -> Self {
        Self::NotFound("version not found".to_string())
    }

    pub fn unknown_user() -> Self {
        Self::Unauthorized("user does not exist or is invalid".to_string())
    }

    pub fn insufficient_privileges() -> Self {
        Self::Forbidden("insufficient privileges for this action".to_string())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // Backend detail goes to the log, not to the caller.
        tracing::error!(error = %err, "storage failure");
        Self::Internal("storage failure".to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
