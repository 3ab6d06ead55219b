//! HTTP request layer for the trading cockpit service.
//!
//! Wraps the pull endpoints (metrics, equity, positions, trades, status,
//! prices, reasoning, market snapshot) and the control endpoints (kill switch,
//! order placement, AI decision). Non-2xx responses are turned into
//! [`ApiError::Rejected`] carrying the server's message.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiConfig, CockpitClient};
pub use error::{ApiError, ApiResult};
pub use types::{DecisionResponse, Execution, OrderAck, OrderRequest, OrderSide};
