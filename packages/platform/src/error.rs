use sea_orm::DbErr;
use thiserror::Error;

/// Application-level error type.
///
/// The business variants (everything except `Collaborator` and `Database`)
/// are expected outcomes returned to callers, never logged as system errors.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Caller lacks the role the operation requires.
    #[error("Permission denied: {0}")]
    Unauthorized(String),

    /// Field-level validation failure, naming the offending field.
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// An explicitly supplied moderator failed the eligibility check.
    #[error("Invalid moderator: {0}")]
    InvalidModerator(String),

    /// Automatic selection found no moderator passing the eligibility check.
    #[error("No eligible moderator available")]
    NoEligibleModerator,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Fault in an external collaborator (profile directory, topic catalog).
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl PlatformError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}
