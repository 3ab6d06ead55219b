//! Feed error types.

use thiserror::Error;

/// Failure of one poll operation.
///
/// Cloneable so a single shared result can be handed to every caller that
/// joined the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("Request failed: {0}")]
    Failed(String),

    #[error("Poll task aborted: {0}")]
    Aborted(String),

    #[error("Poll task not registered: {0}")]
    NotRegistered(String),
}

pub type PollResult<T> = Result<T, PollError>;
