//! Freshness classification of snapshot fields.
//!
//! A field is in exactly one of three states. Insufficiency is checked before
//! staleness, so insufficient data is never also reported as stale.

use crate::snapshot::SnapshotField;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-field data quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    Fresh,
    /// Valid data older than its freshness threshold.
    Stale,
    /// Structurally present but inadequate to render (or never received).
    #[default]
    Insufficient,
}

impl Freshness {
    /// Classify from an insufficiency verdict and an optional data age.
    pub fn classify(insufficient: bool, age_ms: Option<i64>, threshold: Duration) -> Self {
        if insufficient {
            return Self::Insufficient;
        }
        let threshold_ms = i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX);
        match age_ms {
            Some(age) if age > threshold_ms => Self::Stale,
            _ => Self::Fresh,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::Insufficient)
    }

    /// Renderers may draw the full view (possibly with a stale badge).
    pub fn is_renderable(&self) -> bool {
        !self.is_insufficient()
    }
}

impl std::fmt::Display for Freshness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fresh => write!(f, "fresh"),
            Self::Stale => write!(f, "stale"),
            Self::Insufficient => write!(f, "insufficient"),
        }
    }
}

/// Freshness thresholds in milliseconds, per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessPolicy {
    #[serde(default = "default_metrics_ms")]
    pub metrics_ms: u64,
    /// Applied to the timestamp of the last equity point.
    #[serde(default = "default_equity_ms")]
    pub equity_ms: u64,
    #[serde(default = "default_positions_ms")]
    pub positions_ms: u64,
    #[serde(default = "default_trades_ms")]
    pub trades_ms: u64,
    #[serde(default = "default_reasoning_ms")]
    pub reasoning_ms: u64,
    #[serde(default = "default_prices_ms")]
    pub prices_ms: u64,
    #[serde(default = "default_status_ms")]
    pub status_ms: u64,
    /// Applied to `last_update_ms` when present, receipt time otherwise.
    #[serde(default = "default_market_ms")]
    pub market_ms: u64,
    #[serde(default = "default_kill_switch_ms")]
    pub kill_switch_ms: u64,
}

fn default_metrics_ms() -> u64 {
    30_000
}

fn default_equity_ms() -> u64 {
    3_600_000
}

fn default_positions_ms() -> u64 {
    30_000
}

fn default_trades_ms() -> u64 {
    120_000
}

fn default_reasoning_ms() -> u64 {
    300_000
}

fn default_prices_ms() -> u64 {
    30_000
}

fn default_status_ms() -> u64 {
    30_000
}

fn default_market_ms() -> u64 {
    15_000
}

fn default_kill_switch_ms() -> u64 {
    120_000
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            metrics_ms: default_metrics_ms(),
            equity_ms: default_equity_ms(),
            positions_ms: default_positions_ms(),
            trades_ms: default_trades_ms(),
            reasoning_ms: default_reasoning_ms(),
            prices_ms: default_prices_ms(),
            status_ms: default_status_ms(),
            market_ms: default_market_ms(),
            kill_switch_ms: default_kill_switch_ms(),
        }
    }
}

impl FreshnessPolicy {
    pub fn threshold(&self, field: SnapshotField) -> Duration {
        let ms = match field {
            SnapshotField::Metrics => self.metrics_ms,
            SnapshotField::Equity => self.equity_ms,
            SnapshotField::Positions => self.positions_ms,
            SnapshotField::Trades => self.trades_ms,
            SnapshotField::Reasoning => self.reasoning_ms,
            SnapshotField::Prices => self.prices_ms,
            SnapshotField::Status => self.status_ms,
            SnapshotField::Market => self.market_ms,
            SnapshotField::KillSwitch => self.kill_switch_ms,
        };
        Duration::from_millis(ms)
    }
}
