//! Record shapes delivered by the remote service.
//!
//! Every type here mirrors one JSON shape served either over the push channel
//! or by a pull endpoint. Unknown fields are ignored; optional numeric fields
//! default so that a sparse record still decodes.

use crate::error::{CoreError, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Push channel connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// Whether the push channel is currently the live data path.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Timestamp
// ============================================================================

/// Numeric timestamps at or above this are milliseconds, below are seconds.
const MILLIS_CUTOFF: f64 = 1e11;

/// UTC instant accepting the several encodings the service emits.
///
/// Accepted inputs: RFC 3339 strings, naive ISO strings (assumed UTC, as the
/// service formats `datetime.now().isoformat()`), and numeric epoch values in
/// seconds or milliseconds. Serializes back as RFC 3339.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(inner: DateTime<Utc>) -> Self {
        Self(inner)
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Build from epoch milliseconds.
    pub fn from_millis(ms: i64) -> Result<Self> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .map(Self)
            .ok_or_else(|| CoreError::InvalidTimestamp(ms.to_string()))
    }

    /// Parse a textual timestamp.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
                return Ok(Self(Utc.from_utc_datetime(&naive)));
            }
        }
        if let Ok(number) = trimmed.parse::<f64>() {
            return Self::from_epoch_number(number);
        }
        Err(CoreError::InvalidTimestamp(text.to_string()))
    }

    fn from_epoch_number(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(CoreError::InvalidTimestamp(value.to_string()));
        }
        let ms = if value >= MILLIS_CUTOFF {
            value
        } else {
            value * 1000.0
        };
        Self::from_millis(ms.round() as i64)
    }

    pub fn inner(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Age relative to `now` in milliseconds (negative for future stamps).
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.0).num_milliseconds()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Timestamp::from_epoch_number(n),
            Raw::Text(s) => Timestamp::parse(&s),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Records
// ============================================================================

/// Provenance / quality annotation attached by the service as `_meta`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataMeta {
    #[serde(default)]
    pub insufficient: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One point of the equity curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

impl EquityPoint {
    pub fn new(timestamp: Timestamp, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Portfolio aggregates served by the summary endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharpe: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_dd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trades: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worst_pnl: Option<f64>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<DataMeta>,
}

impl Metrics {
    /// Keys a metrics object must carry to render the summary card.
    pub const REQUIRED_KEYS: [&'static str; 5] =
        ["total_value", "win_rate", "sharpe", "max_dd", "trades"];

    /// Required keys absent from this object.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let present = [
            self.total_value.is_some(),
            self.win_rate.is_some(),
            self.sharpe.is_some(),
            self.max_dd.is_some(),
            self.trades.is_some(),
        ];
        Self::REQUIRED_KEYS
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(key, _)| *key)
            .collect()
    }

    /// The service flagged the object, or required keys are missing.
    pub fn is_insufficient(&self) -> bool {
        self.meta.as_ref().is_some_and(|m| m.insufficient) || !self.missing_keys().is_empty()
    }
}

/// Direction of a position or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    #[serde(alias = "LONG", alias = "Long")]
    Long,
    #[serde(alias = "SHORT", alias = "Short")]
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Open position record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub coin: String,
    pub entry: f64,
    #[serde(default)]
    pub current: f64,
    pub qty: f64,
    #[serde(default)]
    pub lev: f64,
    #[serde(default)]
    pub sl: f64,
    #[serde(default)]
    pub tp: f64,
    #[serde(default)]
    pub margin: f64,
    #[serde(default)]
    pub pnl: f64,
}

/// Closed trade record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,
    pub coin: String,
    pub entry: f64,
    #[serde(default)]
    pub exit: f64,
    pub qty: f64,
    #[serde(default)]
    pub close_reason: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub holding: String,
    #[serde(default)]
    pub notional: f64,
    #[serde(default)]
    pub fees: f64,
    #[serde(default)]
    pub pnl: f64,
}

/// One AI decision explanation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningEntry {
    #[serde(default)]
    pub asset: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub signals: String,
    #[serde(default)]
    pub bias: String,
    #[serde(default)]
    pub recommendation: String,
}

/// Market microstructure values for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMicro {
    #[serde(default)]
    pub spread_bps: Option<f64>,
    #[serde(default)]
    pub obi: Option<f64>,
    #[serde(default)]
    pub rtn_5s: Option<f64>,
}

/// Market snapshot for one symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    #[serde(default)]
    pub micro: Option<MarketMicro>,
    #[serde(default)]
    pub meta: DataMeta,
    /// Exchange-side time of the last tick behind these values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_ms: Option<i64>,
}

impl MarketEntry {
    /// Entry explicitly flagged as lacking data.
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self {
            micro: None,
            meta: DataMeta {
                insufficient: true,
                reason: Some(reason.into()),
                ..DataMeta::default()
            },
            last_update_ms: None,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.meta.insufficient || self.micro.is_none()
    }
}

/// Kill switch state (`true` = trading allowed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillSwitchState {
    pub enabled: bool,
}
