//! Which keys a poll tick requests, and how each key is fetched.

use crate::config::PollConfig;
use cockpit_api::{ApiResult, CockpitClient};
use cockpit_core::{ConnectionState, SnapshotField, SnapshotPatch};

const MARKET_PREFIX: &str = "market-";

/// Fields the push channel also delivers.
pub const PUSH_COVERED: [SnapshotField; 6] = [
    SnapshotField::Metrics,
    SnapshotField::Equity,
    SnapshotField::Positions,
    SnapshotField::Trades,
    SnapshotField::Reasoning,
    SnapshotField::Prices,
];

/// Fields only the pull path delivers.
pub const PULL_ONLY: [SnapshotField; 2] = [SnapshotField::Status, SnapshotField::KillSwitch];

/// A registered poll task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PollKey {
    Field(SnapshotField),
    /// Microstructure for one symbol.
    Market(String),
}

impl PollKey {
    pub fn as_key(&self) -> String {
        match self {
            Self::Field(field) => field.as_str().to_string(),
            Self::Market(symbol) => market_key(symbol),
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        if let Some(symbol) = key.strip_prefix(MARKET_PREFIX) {
            return (!symbol.is_empty()).then(|| Self::Market(symbol.to_string()));
        }
        match SnapshotField::from_key(key)? {
            SnapshotField::Market => None,
            field => Some(Self::Field(field)),
        }
    }

    pub fn is_push_covered(&self) -> bool {
        matches!(self, Self::Field(f) if PUSH_COVERED.contains(f))
    }

    /// Fetch this key and wrap the result as a single-field patch.
    pub async fn fetch(&self, client: &CockpitClient, poll: &PollConfig) -> ApiResult<SnapshotPatch> {
        let patch = match self {
            Self::Field(SnapshotField::Metrics) => SnapshotPatch::metrics(client.metrics().await?),
            Self::Field(SnapshotField::Equity) => SnapshotPatch::equity(client.equity().await?),
            Self::Field(SnapshotField::Positions) => {
                SnapshotPatch::positions(client.positions(None).await?)
            }
            Self::Field(SnapshotField::Trades) => {
                SnapshotPatch::trades(client.trades(poll.trades_limit).await?)
            }
            Self::Field(SnapshotField::Reasoning) => {
                SnapshotPatch::reasoning(client.reasoning(poll.reasoning_limit).await?)
            }
            Self::Field(SnapshotField::Prices) => SnapshotPatch::prices(client.prices().await?),
            Self::Field(SnapshotField::Status) => SnapshotPatch::status(client.status().await?),
            Self::Field(SnapshotField::KillSwitch) => {
                SnapshotPatch::kill_switch(client.kill_switch().await?)
            }
            Self::Field(SnapshotField::Market) => SnapshotPatch::default(),
            Self::Market(symbol) => {
                SnapshotPatch::market(symbol.clone(), client.market_snapshot(symbol).await?)
            }
        };
        Ok(patch)
    }
}

impl std::fmt::Display for PollKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_key())
    }
}

pub fn market_key(symbol: &str) -> String {
    format!("{MARKET_PREFIX}{symbol}")
}

/// Keys registered for every session regardless of symbol selection.
pub fn base_keys() -> Vec<PollKey> {
    PUSH_COVERED
        .iter()
        .chain(PULL_ONLY.iter())
        .map(|f| PollKey::Field(*f))
        .collect()
}

/// Keys refreshed after a trading action.
pub fn trading_keys() -> Vec<String> {
    [
        SnapshotField::Positions,
        SnapshotField::Trades,
        SnapshotField::Metrics,
    ]
    .iter()
    .map(|f| f.as_str().to_string())
    .collect()
}

/// Selects the due keys for one tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollPlan {
    pub poll_push_fields_when_connected: bool,
}

impl PollPlan {
    pub fn new(config: &PollConfig) -> Self {
        Self {
            poll_push_fields_when_connected: config.poll_push_fields_when_connected,
        }
    }

    /// Registered keys due for polling in the given push channel state.
    /// Push-covered fields are skipped while the channel is connected.
    pub fn due_keys(&self, registered: &[String], connection: ConnectionState) -> Vec<String> {
        let skip_push = connection.is_connected() && !self.poll_push_fields_when_connected;
        registered
            .iter()
            .filter(|key| {
                let push_covered = PollKey::parse(key).is_some_and(|k| k.is_push_covered());
                !(skip_push && push_covered)
            })
            .cloned()
            .collect()
    }
}
