//! Chart error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartError {
    #[error("Series is empty")]
    EmptySeries,

    #[error("Non-finite value at index {index}")]
    NonFiniteValue { index: usize },

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}

pub type ChartResult<T> = Result<T, ChartError>;
