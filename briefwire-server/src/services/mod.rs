//! Database-backed services for the messaging and notification core.

pub mod delivery;
pub mod fanout;
pub mod ingest;
pub mod inbox;
pub mod read_state;
pub mod sequence;

use thiserror::Error;

/// Error taxonomy shared by the core services.
///
/// Ingestion and read-state failures are synchronous and bubble to the caller
/// as one of these variants; stream-side delivery failures are absorbed and
/// never surface as request errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
