//! Prometheus metrics and structured logging for the trading cockpit.
//!
//! - Prometheus metrics for the push channel, polling and aggregation
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
