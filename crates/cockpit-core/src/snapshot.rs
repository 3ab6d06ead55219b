//! Authoritative client-side view and its partial updates.
//!
//! A `Snapshot` field is replaced wholesale or not at all. `SnapshotPatch`
//! decoding therefore works per field: a field with the wrong JSON shape is
//! rejected as a unit and reported, while sibling fields of the same message
//! still apply.

use crate::types::{
    EquityPoint, KillSwitchState, MarketEntry, Metrics, Position, ReasoningEntry, Trade,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Independently updatable snapshot fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotField {
    Metrics,
    Equity,
    Positions,
    Trades,
    Reasoning,
    Prices,
    Status,
    Market,
    KillSwitch,
}

impl SnapshotField {
    pub const ALL: [SnapshotField; 9] = [
        Self::Metrics,
        Self::Equity,
        Self::Positions,
        Self::Trades,
        Self::Reasoning,
        Self::Prices,
        Self::Status,
        Self::Market,
        Self::KillSwitch,
    ];

    /// JSON key carrying this field in push messages and patches.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metrics => "metrics",
            Self::Equity => "equity",
            Self::Positions => "positions",
            Self::Trades => "trades",
            Self::Reasoning => "reasoning",
            Self::Prices => "prices",
            Self::Status => "status",
            Self::Market => "market",
            Self::KillSwitch => "kill_switch",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == key)
    }
}

impl std::fmt::Display for SnapshotField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified in-memory view of all dashboard data domains.
///
/// `None` means the field has never been received this session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub metrics: Option<Metrics>,
    pub equity: Option<Vec<EquityPoint>>,
    pub positions: Option<Vec<Position>>,
    pub trades: Option<Vec<Trade>>,
    pub reasoning: Option<Vec<ReasoningEntry>>,
    pub prices: Option<BTreeMap<String, f64>>,
    /// Raw subsystem health strings (`market`, `api`, `db`, `ws`, `bot`).
    pub status: Option<BTreeMap<String, String>>,
    /// Microstructure by symbol. Each symbol entry is replaced on its own.
    pub market: BTreeMap<String, MarketEntry>,
    pub kill_switch: Option<KillSwitchState>,
}

impl Snapshot {
    /// Apply a patch, replacing every field it carries.
    ///
    /// Returns the fields that were written.
    pub fn apply(&mut self, patch: SnapshotPatch) -> Vec<SnapshotField> {
        let touched = patch.present_fields();
        let SnapshotPatch {
            metrics,
            equity,
            positions,
            trades,
            reasoning,
            prices,
            status,
            market,
            kill_switch,
        } = patch;

        if metrics.is_some() {
            self.metrics = metrics;
        }
        if equity.is_some() {
            self.equity = equity;
        }
        if positions.is_some() {
            self.positions = positions;
        }
        if trades.is_some() {
            self.trades = trades;
        }
        if reasoning.is_some() {
            self.reasoning = reasoning;
        }
        if prices.is_some() {
            self.prices = prices;
        }
        if status.is_some() {
            self.status = status;
        }
        if let Some(entries) = market {
            self.market.extend(entries);
        }
        if kill_switch.is_some() {
            self.kill_switch = kill_switch;
        }

        touched
    }
}

/// Partial snapshot update. Absent fields leave the snapshot untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SnapshotPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity: Option<Vec<EquityPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<Position>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trades: Option<Vec<Trade>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Vec<ReasoningEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prices: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<BTreeMap<String, MarketEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_switch: Option<KillSwitchState>,
}

/// A field dropped while decoding a patch.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRejection {
    pub field: SnapshotField,
    pub reason: String,
}

/// Result of decoding a JSON object into a patch.
#[derive(Debug, Clone, Default)]
pub struct DecodedPatch {
    pub patch: SnapshotPatch,
    pub rejected: Vec<FieldRejection>,
}

impl SnapshotPatch {
    pub fn metrics(metrics: Metrics) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::default()
        }
    }

    pub fn equity(points: Vec<EquityPoint>) -> Self {
        Self {
            equity: Some(points),
            ..Self::default()
        }
    }

    pub fn positions(positions: Vec<Position>) -> Self {
        Self {
            positions: Some(positions),
            ..Self::default()
        }
    }

    pub fn trades(trades: Vec<Trade>) -> Self {
        Self {
            trades: Some(trades),
            ..Self::default()
        }
    }

    pub fn reasoning(entries: Vec<ReasoningEntry>) -> Self {
        Self {
            reasoning: Some(entries),
            ..Self::default()
        }
    }

    pub fn prices(prices: BTreeMap<String, f64>) -> Self {
        Self {
            prices: Some(prices),
            ..Self::default()
        }
    }

    pub fn status(status: BTreeMap<String, String>) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn market(symbol: impl Into<String>, entry: MarketEntry) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(symbol.into(), entry);
        Self {
            market: Some(entries),
            ..Self::default()
        }
    }

    pub fn kill_switch(state: KillSwitchState) -> Self {
        Self {
            kill_switch: Some(state),
            ..Self::default()
        }
    }

    /// Fields carried by this patch.
    pub fn present_fields(&self) -> Vec<SnapshotField> {
        let mut fields = Vec::new();
        if self.metrics.is_some() {
            fields.push(SnapshotField::Metrics);
        }
        if self.equity.is_some() {
            fields.push(SnapshotField::Equity);
        }
        if self.positions.is_some() {
            fields.push(SnapshotField::Positions);
        }
        if self.trades.is_some() {
            fields.push(SnapshotField::Trades);
        }
        if self.reasoning.is_some() {
            fields.push(SnapshotField::Reasoning);
        }
        if self.prices.is_some() {
            fields.push(SnapshotField::Prices);
        }
        if self.status.is_some() {
            fields.push(SnapshotField::Status);
        }
        if self.market.is_some() {
            fields.push(SnapshotField::Market);
        }
        if self.kill_switch.is_some() {
            fields.push(SnapshotField::KillSwitch);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.present_fields().is_empty()
    }

    /// Fold `other` into `self`; fields present in `other` win.
    ///
    /// Used to combine the results of one poll tick before a single apply.
    pub fn merge(&mut self, other: SnapshotPatch) {
        if other.metrics.is_some() {
            self.metrics = other.metrics;
        }
        if other.equity.is_some() {
            self.equity = other.equity;
        }
        if other.positions.is_some() {
            self.positions = other.positions;
        }
        if other.trades.is_some() {
            self.trades = other.trades;
        }
        if other.reasoning.is_some() {
            self.reasoning = other.reasoning;
        }
        if other.prices.is_some() {
            self.prices = other.prices;
        }
        if other.status.is_some() {
            self.status = other.status;
        }
        if let Some(entries) = other.market {
            self.market.get_or_insert_with(BTreeMap::new).extend(entries);
        }
        if other.kill_switch.is_some() {
            self.kill_switch = other.kill_switch;
        }
    }

    /// Decode a JSON object field by field. Unknown keys are ignored.
    pub fn decode(value: &Value) -> DecodedPatch {
        let mut decoded = DecodedPatch::default();
        let Some(object) = value.as_object() else {
            return decoded;
        };

        for (key, raw) in object {
            let Some(field) = SnapshotField::from_key(key) else {
                continue;
            };
            if let Err(reason) = decoded.patch.decode_field(field, raw) {
                decoded.rejected.push(FieldRejection { field, reason });
            }
        }

        decoded
    }

    fn decode_field(&mut self, field: SnapshotField, raw: &Value) -> Result<(), String> {
        match field {
            SnapshotField::Metrics => self.metrics = Some(from_value(raw)?),
            SnapshotField::Equity => self.equity = Some(from_value(raw)?),
            SnapshotField::Positions => self.positions = Some(from_value(raw)?),
            SnapshotField::Trades => self.trades = Some(from_value(raw)?),
            SnapshotField::Reasoning => self.reasoning = Some(from_value(raw)?),
            SnapshotField::Prices => self.prices = Some(from_value(raw)?),
            SnapshotField::Status => self.status = Some(decode_status(raw)?),
            SnapshotField::Market => self.market = Some(from_value(raw)?),
            SnapshotField::KillSwitch => self.kill_switch = Some(from_value(raw)?),
        }
        Ok(())
    }
}

fn from_value<T: DeserializeOwned>(raw: &Value) -> Result<T, String> {
    T::deserialize(raw).map_err(|e| e.to_string())
}

/// Status maps carry a `_meta` object next to the subsystem strings; keep
/// only the string entries.
pub fn decode_status(raw: &Value) -> Result<BTreeMap<String, String>, String> {
    let object = raw
        .as_object()
        .ok_or_else(|| format!("expected object, found {}", json_kind(raw)))?;
    Ok(object
        .iter()
        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
