//! Request and response bodies of the control endpoints.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Body of `POST /order/limit_ioc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub notional_usd: f64,
    #[serde(default)]
    pub reduce_only: bool,
}

/// Accepted order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderAck {
    #[serde(deserialize_with = "string_or_number")]
    pub order_id: String,
    pub avg_px: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub mock: bool,
}

/// Exchange order ids are sometimes numeric.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// The decision the service's agent made.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Decision {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub notional_usd: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// What happened when the decision was executed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Execution {
    #[serde(default, alias = "result")]
    pub status: Option<String>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub notional_usd: Option<f64>,
    #[serde(default, alias = "fill_px")]
    pub avg_px: Option<f64>,
    #[serde(default, alias = "reason")]
    pub error: Option<String>,
}

/// Response of `POST /decide_and_execute`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DecisionResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub execution: Option<Execution>,
}

impl DecisionResponse {
    /// An execution took place (filled or attempted).
    pub fn executed(&self) -> bool {
        self.execution.as_ref().is_some_and(|e| e.error.is_none())
    }

    /// One-line operator summary.
    pub fn summary(&self) -> String {
        let Some(exec) = &self.execution else {
            return match self.status.as_deref() {
                Some(status) if status != "noop" => format!("AI decision: {status}"),
                _ => "AI decision: no action".to_string(),
            };
        };
        if let Some(error) = &exec.error {
            return format!("AI execution failed: {error}");
        }

        let decision = self.decision.clone().unwrap_or_default();
        let status = exec.status.as_deref().unwrap_or("executed");
        let side = exec
            .side
            .as_deref()
            .or(decision.action.as_deref())
            .unwrap_or("?");
        let symbol = exec
            .symbol
            .as_deref()
            .or(decision.symbol.as_deref())
            .unwrap_or("?");
        let notional = exec.notional_usd.or(decision.notional_usd);

        let mut text = format!("AI {status} {side}");
        if let Some(n) = notional {
            text.push_str(&format!(" ${n}"));
        }
        text.push_str(&format!(" {symbol}"));
        if let Some(px) = exec.avg_px {
            text.push_str(&format!(" @ {px}"));
        }
        text
    }
}
