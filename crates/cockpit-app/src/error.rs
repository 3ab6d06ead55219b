//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] cockpit_core::CoreError),

    #[error("{0}")]
    Api(#[from] cockpit_api::ApiError),

    #[error("Chart error: {0}")]
    Chart(#[from] cockpit_chart::ChartError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] cockpit_telemetry::TelemetryError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Action already in progress: {0}")]
    Busy(&'static str),

    #[error("Session already started")]
    AlreadyStarted,
}

pub type AppResult<T> = Result<T, AppError>;
