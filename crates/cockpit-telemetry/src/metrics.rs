//! Prometheus metrics for the cockpit client.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error caught at first use.

use crate::error::{TelemetryError, TelemetryResult};
use cockpit_core::{ConnectionState, Freshness, SnapshotField};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Gauge, GaugeVec, IntCounter, IntGauge, TextEncoder,
};

/// Push channel connection state (1 = connected).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "cockpit_ws_connected",
        "Push channel connection state (1=connected)"
    )
    .unwrap()
});

/// Labels: state (disconnected/connecting/connected/error)
pub static WS_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "cockpit_ws_state",
        "Push channel state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

pub static WS_RECONNECT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "cockpit_ws_reconnect_total",
        "Total push channel reconnects scheduled"
    )
    .unwrap()
});

pub static WS_MESSAGES_DROPPED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "cockpit_ws_messages_dropped",
        "Malformed push messages dropped this session"
    )
    .unwrap()
});

/// Labels: key, outcome (ok/error)
pub static POLL_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cockpit_poll_total",
        "Poll operations by key and outcome",
        &["key", "outcome"]
    )
    .unwrap()
});

pub static POLL_DEDUPE_HITS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "cockpit_poll_dedupe_hits",
        "Poll requests that joined an in-flight request"
    )
    .unwrap()
});

pub static POLL_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("cockpit_poll_in_flight", "Poll requests currently in flight").unwrap()
});

/// Labels: source (push/poll)
pub static SNAPSHOT_APPLY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cockpit_snapshot_apply_total",
        "Patches applied to the snapshot",
        &["source"]
    )
    .unwrap()
});

/// Labels: field, source
pub static PATCH_FIELD_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cockpit_patch_field_rejected_total",
        "Patch fields rejected for having the wrong shape",
        &["field", "source"]
    )
    .unwrap()
});

/// Labels: field, freshness
pub static FIELD_FRESHNESS: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "cockpit_field_freshness",
        "Current classification of each snapshot field (1=active)",
        &["field", "freshness"]
    )
    .unwrap()
});

/// Labels: action (order/kill_switch/decide), outcome (ok/rejected)
pub static ACTION_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "cockpit_action_total",
        "Operator actions by outcome",
        &["action", "outcome"]
    )
    .unwrap()
});

const STATES: [ConnectionState; 4] = [
    ConnectionState::Disconnected,
    ConnectionState::Connecting,
    ConnectionState::Connected,
    ConnectionState::Error,
];

const FRESHNESS: [Freshness; 3] = [Freshness::Fresh, Freshness::Stale, Freshness::Insufficient];

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    /// Only the active state is set to 1.
    pub fn ws_state_set(state: ConnectionState) {
        for s in STATES {
            WS_STATE.with_label_values(&[s.as_str()]).set(0.0);
        }
        WS_STATE.with_label_values(&[state.as_str()]).set(1.0);
        WS_CONNECTED.set(if state.is_connected() { 1.0 } else { 0.0 });
    }

    pub fn ws_reconnect() {
        WS_RECONNECT_TOTAL.inc();
    }

    pub fn ws_messages_dropped(total: u64) {
        WS_MESSAGES_DROPPED.set(total as i64);
    }

    pub fn poll_outcome(key: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        POLL_TOTAL.with_label_values(&[key, outcome]).inc();
    }

    pub fn poll_dedupe_hits(total: u64) {
        POLL_DEDUPE_HITS.set(total as i64);
    }

    pub fn poll_in_flight(count: usize) {
        POLL_IN_FLIGHT.set(count as i64);
    }

    pub fn snapshot_applied(source: &str) {
        SNAPSHOT_APPLY_TOTAL.with_label_values(&[source]).inc();
    }

    pub fn patch_field_rejected(field: SnapshotField, source: &str) {
        PATCH_FIELD_REJECTED_TOTAL
            .with_label_values(&[field.as_str(), source])
            .inc();
    }

    pub fn field_freshness(field: SnapshotField, freshness: Freshness) {
        for f in FRESHNESS {
            let active = if f == freshness { 1.0 } else { 0.0 };
            let label = f.to_string();
            FIELD_FRESHNESS
                .with_label_values(&[field.as_str(), label.as_str()])
                .set(active);
        }
    }

    pub fn action(action: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "rejected" };
        ACTION_TOTAL.with_label_values(&[action, outcome]).inc();
    }

    /// Every registered metric in Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
