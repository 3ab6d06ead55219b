//! Subsystem health presentation.
//!
//! The status endpoint reports five subsystems with small ad-hoc vocabularies
//! (`ok`/`error`, `healthy`/`error`, `synced`/`stale`, ...). Each raw value is
//! folded into a presentation tier; anything unrecognised is `Unknown`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Monitored subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Bot,
    Market,
    Api,
    Db,
    Ws,
}

impl Subsystem {
    pub const ALL: [Subsystem; 5] = [Self::Bot, Self::Market, Self::Api, Self::Db, Self::Ws];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bot => "bot",
            Self::Market => "market",
            Self::Api => "api",
            Self::Db => "db",
            Self::Ws => "ws",
        }
    }
}

/// Presentation tier of a status light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthTier {
    Healthy,
    Degraded,
    #[default]
    Unknown,
}

impl HealthTier {
    /// Map a raw health string. Case-insensitive, never fails.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ok" | "healthy" | "synced" | "connected" | "running" => Self::Healthy,
            "error" | "stale" | "disconnected" | "degraded" | "mock" | "stopped" => {
                Self::Degraded
            }
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for HealthTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The five status lights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusLights {
    pub bot: HealthTier,
    pub market: HealthTier,
    pub api: HealthTier,
    pub db: HealthTier,
    pub ws: HealthTier,
}

impl StatusLights {
    /// Derive lights from a raw status map. Missing subsystems are `Unknown`.
    pub fn from_status(status: Option<&BTreeMap<String, String>>) -> Self {
        let tier = |subsystem: Subsystem| {
            status
                .and_then(|s| s.get(subsystem.as_str()))
                .map(|raw| HealthTier::from_raw(raw))
                .unwrap_or_default()
        };
        Self {
            bot: tier(Subsystem::Bot),
            market: tier(Subsystem::Market),
            api: tier(Subsystem::Api),
            db: tier(Subsystem::Db),
            ws: tier(Subsystem::Ws),
        }
    }

    pub fn get(&self, subsystem: Subsystem) -> HealthTier {
        match subsystem {
            Subsystem::Bot => self.bot,
            Subsystem::Market => self.market,
            Subsystem::Api => self.api,
            Subsystem::Db => self.db,
            Subsystem::Ws => self.ws,
        }
    }

    /// No subsystem reported a recognised value.
    pub fn all_unknown(&self) -> bool {
        Subsystem::ALL
            .iter()
            .all(|s| self.get(*s) == HealthTier::Unknown)
    }
}
