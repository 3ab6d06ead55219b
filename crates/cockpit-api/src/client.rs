//! HTTP client for the cockpit service.

use crate::error::{ApiError, ApiResult};
use crate::types::{DecisionResponse, OrderAck, OrderRequest};
use cockpit_core::snapshot::decode_status;
use cockpit_core::{
    DataMeta, EquityPoint, KillSwitchState, MarketEntry, MarketMicro, Metrics, Position,
    ReasoningEntry, Trade,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Request layer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. None waits indefinitely.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: None,
        }
    }
}

/// Client for the cockpit service's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct CockpitClient {
    client: Client,
    base_url: String,
}

impl CockpitClient {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        let mut builder = Client::builder();
        if let Some(ms) = config.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| ApiError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, path: &str) -> ApiResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("{path}: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("{path}: {e}")))?;

        if !status.is_success() {
            let err = ApiError::rejected(status.as_u16(), &body);
            warn!(path, status = status.as_u16(), error = %err, "Request rejected");
            return Err(err);
        }

        debug!(path, bytes = body.len(), "Response received");
        serde_json::from_str(&body).map_err(|e| ApiError::Decode(format!("{path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<T> {
        let request = self.client.get(self.url(path)).query(query);
        self.send(request, path).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let request = self.client.post(self.url(path)).json(body);
        self.send(request, path).await
    }

    pub async fn metrics(&self) -> ApiResult<Metrics> {
        self.get("/metrics", &[]).await
    }

    pub async fn equity(&self) -> ApiResult<Vec<EquityPoint>> {
        self.get("/equity", &[]).await
    }

    pub async fn positions(&self, symbol: Option<&str>) -> ApiResult<Vec<Position>> {
        let query: Vec<(&str, String)> = symbol
            .map(|s| vec![("symbol", s.to_string())])
            .unwrap_or_default();
        self.get("/positions", &query).await
    }

    pub async fn trades(&self, limit: usize) -> ApiResult<Vec<Trade>> {
        self.get("/trades", &[("limit", limit.to_string())]).await
    }

    /// Subsystem health strings. Non-string entries (such as `_meta`) are skipped.
    pub async fn status(&self) -> ApiResult<BTreeMap<String, String>> {
        let raw: Value = self.get("/status", &[]).await?;
        decode_status(&raw).map_err(|e| ApiError::Decode(format!("/status: {e}")))
    }

    pub async fn prices(&self) -> ApiResult<BTreeMap<String, f64>> {
        self.get("/prices", &[]).await
    }

    /// Most recent decision explanations, newest last, at most `limit`.
    pub async fn reasoning(&self, limit: usize) -> ApiResult<Vec<ReasoningEntry>> {
        let mut entries: Vec<ReasoningEntry> = self.get("/reasoning", &[]).await?;
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }

    /// Microstructure for one symbol, normalized to a [`MarketEntry`].
    pub async fn market_snapshot(&self, symbol: &str) -> ApiResult<MarketEntry> {
        let raw: Value = self
            .get("/market/snapshot", &[("symbols", symbol.to_string())])
            .await?;
        normalize_market_snapshot(symbol, &raw)
    }

    pub async fn kill_switch(&self) -> ApiResult<KillSwitchState> {
        self.get("/kill_switch", &[]).await
    }

    pub async fn set_kill_switch(&self, enabled: bool) -> ApiResult<KillSwitchState> {
        info!(enabled, "Setting kill switch");
        self.post("/kill_switch", &json!({ "enabled": enabled }))
            .await
    }

    pub async fn place_order(&self, order: &OrderRequest) -> ApiResult<OrderAck> {
        info!(
            symbol = %order.symbol,
            side = %order.side,
            notional_usd = order.notional_usd,
            reduce_only = order.reduce_only,
            "Placing order"
        );
        self.post("/order/limit_ioc", order).await
    }

    /// Ask the service's agent to decide and execute for `symbols`.
    /// Each call carries a fresh `X-Intent-ID` so the service can reject replays.
    pub async fn decide_and_execute(&self, symbols: &[String]) -> ApiResult<DecisionResponse> {
        let intent_id = uuid::Uuid::new_v4().to_string();
        info!(%intent_id, ?symbols, "Requesting AI decision");
        let request = self
            .client
            .post(self.url("/decide_and_execute"))
            .header("X-Intent-ID", intent_id)
            .json(&json!({ "symbols": symbols }));
        self.send(request, "/decide_and_execute").await
    }
}

/// Accept the nested form `{micro, meta}`, the keyed form
/// `{SYM: {spread_bps, obi, last_update_ms}}` and the stale marker
/// `{error: "stale_data"}`.
pub fn normalize_market_snapshot(symbol: &str, raw: &Value) -> ApiResult<MarketEntry> {
    let object = raw
        .as_object()
        .ok_or_else(|| ApiError::Decode("/market/snapshot: expected object".to_string()))?;

    if let Some(error) = object.get("error").and_then(Value::as_str) {
        let reason = object
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or(error);
        return Ok(MarketEntry::insufficient(reason));
    }

    if object.contains_key("micro") || object.contains_key("meta") {
        return serde_json::from_value(raw.clone())
            .map_err(|e| ApiError::Decode(format!("/market/snapshot: {e}")));
    }

    let keyed = object
        .get(symbol)
        .or_else(|| object.get(&symbol.to_uppercase()))
        .ok_or_else(|| {
            ApiError::Decode(format!("/market/snapshot: no entry for {symbol}"))
        })?;

    #[derive(Deserialize)]
    struct KeyedEntry {
        #[serde(default)]
        mid: Option<f64>,
        #[serde(default)]
        spread_bps: Option<f64>,
        #[serde(default)]
        obi: Option<f64>,
        #[serde(default)]
        rtn_5s: Option<f64>,
        #[serde(default)]
        last_update_ms: Option<i64>,
        #[serde(default)]
        meta: DataMeta,
    }

    let entry: KeyedEntry = serde_json::from_value(keyed.clone())
        .map_err(|e| ApiError::Decode(format!("/market/snapshot: {e}")))?;
    if entry.meta.insufficient || (entry.mid.is_none() && entry.spread_bps.is_none()) {
        let mut insufficient = MarketEntry::insufficient(
            entry.meta.reason.clone().unwrap_or_else(|| "no_data".to_string()),
        );
        insufficient.last_update_ms = entry.last_update_ms;
        return Ok(insufficient);
    }

    Ok(MarketEntry {
        micro: Some(MarketMicro {
            spread_bps: entry.spread_bps,
            obi: entry.obi,
            rtn_5s: entry.rtn_5s,
        }),
        meta: entry.meta,
        last_update_ms: entry.last_update_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_market_form() {
        let raw = json!({"micro": {"spread_bps": 2.0, "obi": 0.1, "rtn_5s": 0.001},
                         "meta": {"insufficient": false}});
        let entry = normalize_market_snapshot("BTC", &raw).unwrap();
        assert!(!entry.is_insufficient());
        assert_eq!(entry.micro.unwrap().rtn_5s, Some(0.001));
    }

    #[test]
    fn test_keyed_market_form() {
        let raw = json!({"ETH": {"mid": 3400.0, "spread_bps": 1.2, "obi": -0.3,
                                 "last_update_ms": 1_767_600_000_000_i64}});
        let entry = normalize_market_snapshot("ETH", &raw).unwrap();
        assert!(!entry.is_insufficient());
        assert_eq!(entry.last_update_ms, Some(1_767_600_000_000));
        assert_eq!(entry.micro.unwrap().obi, Some(-0.3));
    }

    #[test]
    fn test_stale_marker_is_insufficient() {
        let raw = json!({"error": "stale_data", "stale_symbols": ["SOL"], "reason": "no_cached_data"});
        let entry = normalize_market_snapshot("SOL", &raw).unwrap();
        assert!(entry.is_insufficient());
        assert_eq!(entry.meta.reason.as_deref(), Some("no_cached_data"));
    }

    #[test]
    fn test_keyed_entry_flagged_insufficient() {
        let raw = json!({"BTC": {"meta": {"insufficient": true, "reason": "no_data"}}});
        assert!(normalize_market_snapshot("BTC", &raw)
            .unwrap()
            .is_insufficient());
    }

    #[test]
    fn test_missing_symbol_is_decode_error() {
        let raw = json!({"BTC": {"mid": 1.0}});
        assert!(matches!(
            normalize_market_snapshot("ETH", &raw),
            Err(ApiError::Decode(_))
        ));
    }
}
