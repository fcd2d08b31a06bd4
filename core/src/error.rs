use thiserror::Error;

/// Domain errors surfaced by the service layer.
///
/// `Conflict` is handled internally (re-read after a unique-constraint race)
/// and should not normally reach a caller; the others map onto the CLI's
/// exit codes and messages.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AccessDenied(String),

    /// The extraction service is unreachable or returned a non-success
    /// status. Retryable by the caller; never retried here.
    #[error("extraction service unavailable: {0}")]
    ExtractionUnavailable(String),

    /// The extraction response could not be decoded into the expected
    /// shape. Not retryable; the user should re-submit different text.
    #[error("could not parse extraction response: {0}")]
    Parse(String),

    /// Unique-constraint collision on concurrent ingredient creation.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the underlying SQLite error is a unique-constraint
    /// violation, the expected outcome of losing an ingredient-creation race.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Db(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}
