//! Shared error types for the services crate.

use thiserror::Error;

use repaso_core::model::{Phase, QuestionError};
use storage::kv::StorageError;

/// Errors emitted by the reasoning client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReasoningError {
    #[error("reasoning service is not configured")]
    Disabled,
    #[error("reasoning service returned an empty response")]
    EmptyResponse,
    #[error("reasoning request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by the session controller.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no questions available for session")]
    Empty,
    #[error("{action} is not allowed in the {phase} phase")]
    PhaseMismatch {
        action: &'static str,
        phase: Phase,
    },
    #[error("question index {index} is out of range")]
    IndexOutOfRange { index: usize },
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
