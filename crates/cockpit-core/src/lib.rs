//! Core data model for the trading cockpit synchronization client.
//!
//! This crate provides the types shared by every layer of the client:
//! - `Snapshot` / `SnapshotPatch`: the authoritative view and its partial updates
//! - `EquityPoint`, `Position`, `Trade`, `Metrics`, ...: remote record shapes
//! - `Freshness`, `FreshnessPolicy`: staleness / insufficiency classification
//! - `HealthTier`, `StatusLights`: subsystem health presentation
//! - `SubscriptionSet`: the operator's ordered symbol selection

pub mod error;
pub mod freshness;
pub mod snapshot;
pub mod status;
pub mod subscription;
pub mod types;

pub use error::{CoreError, Result};
pub use freshness::{Freshness, FreshnessPolicy};
pub use snapshot::{DecodedPatch, FieldRejection, Snapshot, SnapshotField, SnapshotPatch};
pub use status::{HealthTier, StatusLights, Subsystem};
pub use subscription::SubscriptionSet;
pub use types::{
    ConnectionState, DataMeta, EquityPoint, KillSwitchState, MarketEntry, MarketMicro, Metrics,
    Position, PositionSide, ReasoningEntry, Timestamp, Trade,
};
