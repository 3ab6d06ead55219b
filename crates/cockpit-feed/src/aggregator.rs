//! State aggregation.
//!
//! The aggregator owns the [`Snapshot`]. Push messages and poll results both
//! arrive as [`SnapshotPatch`]es and are applied in the order received, last
//! write per field winning. After every apply the aggregator classifies each
//! field, derives the status lights and broadcasts an immutable
//! [`ReconciledView`].

use chrono::{DateTime, Utc};
use cockpit_core::{
    ConnectionState, Freshness, FreshnessPolicy, MarketEntry, Snapshot, SnapshotField,
    SnapshotPatch, StatusLights,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const VIEW_CHANNEL_CAPACITY: usize = 64;

/// Snapshot plus its per-field classification, as rendered.
#[derive(Debug, Clone, Serialize)]
pub struct ReconciledView {
    pub snapshot: Snapshot,
    pub freshness: BTreeMap<SnapshotField, Freshness>,
    /// Classification of each market symbol entry.
    pub market_freshness: BTreeMap<String, Freshness>,
    pub lights: StatusLights,
    /// Push channel state.
    pub connection: ConnectionState,
    pub generated_at: DateTime<Utc>,
}

impl ReconciledView {
    pub fn freshness(&self, field: SnapshotField) -> Freshness {
        self.freshness.get(&field).copied().unwrap_or_default()
    }

    pub fn market_freshness(&self, symbol: &str) -> Freshness {
        self.market_freshness
            .get(symbol)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: Snapshot,
    received: HashMap<SnapshotField, DateTime<Utc>>,
    market_received: HashMap<String, DateTime<Utc>>,
    connection: ConnectionState,
}

/// Single owner of the authoritative snapshot.
pub struct StateAggregator {
    inner: RwLock<Inner>,
    latest: RwLock<Arc<ReconciledView>>,
    policy: FreshnessPolicy,
    view_tx: broadcast::Sender<Arc<ReconciledView>>,
}

impl StateAggregator {
    pub fn new(policy: FreshnessPolicy) -> Self {
        let (view_tx, _) = broadcast::channel(VIEW_CHANNEL_CAPACITY);
        let inner = Inner::default();
        let initial = build_view(&inner, &policy, Utc::now());
        Self {
            inner: RwLock::new(inner),
            latest: RwLock::new(Arc::new(initial)),
            policy,
            view_tx,
        }
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.policy
    }

    /// Apply a partial update and publish the new view.
    ///
    /// Returns the fields written.
    pub fn apply(&self, patch: SnapshotPatch) -> Vec<SnapshotField> {
        self.apply_at(patch, Utc::now())
    }

    /// [`apply`](Self::apply) with an explicit receipt time.
    pub fn apply_at(&self, patch: SnapshotPatch, now: DateTime<Utc>) -> Vec<SnapshotField> {
        if patch.is_empty() {
            return Vec::new();
        }
        let symbols: Vec<String> = patch
            .market
            .as_ref()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        let (view, touched) = {
            let mut inner = self.inner.write();
            let touched = inner.snapshot.apply(patch);
            for field in &touched {
                inner.received.insert(*field, now);
            }
            for symbol in symbols {
                inner.market_received.insert(symbol, now);
            }
            debug!(fields = ?touched, "Applied patch");
            (build_view(&inner, &self.policy, now), touched)
        };
        self.publish(view);
        touched
    }

    /// Recompute classifications against the current clock without new data.
    /// Ageing alone can turn fresh fields stale.
    pub fn reclassify(&self) {
        self.reclassify_at(Utc::now());
    }

    pub fn reclassify_at(&self, now: DateTime<Utc>) {
        let view = build_view(&self.inner.read(), &self.policy, now);
        self.publish(view);
    }

    /// Record the push channel state in the view.
    pub fn set_connection_state(&self, state: ConnectionState) {
        let view = {
            let mut inner = self.inner.write();
            if inner.connection == state {
                return;
            }
            inner.connection = state;
            build_view(&inner, &self.policy, Utc::now())
        };
        self.publish(view);
    }

    /// Drop market entries for symbols no longer selected.
    pub fn retain_market_symbols(&self, symbols: &[String]) {
        let view = {
            let mut inner = self.inner.write();
            let before = inner.snapshot.market.len();
            inner.snapshot.market.retain(|s, _| symbols.contains(s));
            inner.market_received.retain(|s, _| symbols.contains(s));
            if inner.snapshot.market.len() == before {
                return;
            }
            build_view(&inner, &self.policy, Utc::now())
        };
        self.publish(view);
    }

    /// Most recent view.
    pub fn latest(&self) -> Arc<ReconciledView> {
        self.latest.read().clone()
    }

    /// Receive every view published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ReconciledView>> {
        self.view_tx.subscribe()
    }

    fn publish(&self, view: ReconciledView) {
        let view = Arc::new(view);
        *self.latest.write() = view.clone();
        if self.view_tx.send(view).is_err() {
            trace!("No view subscribers");
        }
    }
}

fn build_view(inner: &Inner, policy: &FreshnessPolicy, now: DateTime<Utc>) -> ReconciledView {
    let market_freshness: BTreeMap<String, Freshness> = inner
        .snapshot
        .market
        .iter()
        .map(|(symbol, entry)| {
            let received = inner.market_received.get(symbol).copied();
            let freshness = classify_market_entry(entry, received, policy, now);
            (symbol.clone(), freshness)
        })
        .collect();

    let freshness = SnapshotField::ALL
        .into_iter()
        .map(|field| {
            let freshness = match field {
                SnapshotField::Market => rollup_market(&market_freshness),
                _ => classify_field(
                    &inner.snapshot,
                    field,
                    inner.received.get(&field).copied(),
                    policy,
                    now,
                ),
            };
            (field, freshness)
        })
        .collect();

    ReconciledView {
        snapshot: inner.snapshot.clone(),
        freshness,
        market_freshness,
        lights: StatusLights::from_status(inner.snapshot.status.as_ref()),
        connection: inner.connection,
        generated_at: now,
    }
}

/// Classify one snapshot field.
///
/// Insufficiency is decided from the value; staleness from the data's own
/// timestamp where it has one (equity) and from the receipt time otherwise.
pub fn classify_field(
    snapshot: &Snapshot,
    field: SnapshotField,
    received: Option<DateTime<Utc>>,
    policy: &FreshnessPolicy,
    now: DateTime<Utc>,
) -> Freshness {
    let receipt_age = received.map(|t| (now - t).num_milliseconds());
    let threshold = policy.threshold(field);

    let (insufficient, age) = match field {
        SnapshotField::Metrics => match &snapshot.metrics {
            Some(m) => (m.is_insufficient(), receipt_age),
            None => (true, None),
        },
        SnapshotField::Equity => match snapshot.equity.as_deref() {
            Some([.., last]) => (false, Some(last.timestamp.age_ms(now))),
            _ => (true, None),
        },
        SnapshotField::Positions => {
            series_sufficiency(snapshot.positions.as_ref().map(Vec::len), receipt_age)
        }
        SnapshotField::Trades => {
            series_sufficiency(snapshot.trades.as_ref().map(Vec::len), receipt_age)
        }
        SnapshotField::Reasoning => {
            series_sufficiency(snapshot.reasoning.as_ref().map(Vec::len), receipt_age)
        }
        SnapshotField::Prices => {
            series_sufficiency(snapshot.prices.as_ref().map(BTreeMap::len), receipt_age)
        }
        SnapshotField::Status => match &snapshot.status {
            Some(status) => (
                StatusLights::from_status(Some(status)).all_unknown(),
                receipt_age,
            ),
            None => (true, None),
        },
        SnapshotField::Market => {
            let fields: BTreeMap<String, Freshness> = snapshot
                .market
                .iter()
                .map(|(s, e)| (s.clone(), classify_market_entry(e, received, policy, now)))
                .collect();
            return rollup_market(&fields);
        }
        SnapshotField::KillSwitch => (snapshot.kill_switch.is_none(), receipt_age),
    };

    Freshness::classify(insufficient, age, threshold)
}

fn series_sufficiency(len: Option<usize>, age: Option<i64>) -> (bool, Option<i64>) {
    match len {
        Some(n) if n > 0 => (false, age),
        _ => (true, None),
    }
}

fn classify_market_entry(
    entry: &MarketEntry,
    received: Option<DateTime<Utc>>,
    policy: &FreshnessPolicy,
    now: DateTime<Utc>,
) -> Freshness {
    let age = match entry.last_update_ms {
        Some(ms) => Some(now.timestamp_millis() - ms),
        None => received.map(|t| (now - t).num_milliseconds()),
    };
    Freshness::classify(
        entry.is_insufficient(),
        age,
        policy.threshold(SnapshotField::Market),
    )
}

/// Market as a whole: insufficient unless some symbol is renderable, stale if
/// any renderable symbol is stale.
fn rollup_market(entries: &BTreeMap<String, Freshness>) -> Freshness {
    let renderable: Vec<Freshness> = entries
        .values()
        .copied()
        .filter(Freshness::is_renderable)
        .collect();
    if renderable.is_empty() {
        Freshness::Insufficient
    } else if renderable.iter().any(Freshness::is_stale) {
        Freshness::Stale
    } else {
        Freshness::Fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use cockpit_core::{
        DataMeta, EquityPoint, HealthTier, MarketMicro, Metrics, Position, PositionSide,
        Timestamp,
    };

    fn metrics() -> Metrics {
        Metrics {
            total_value: Some(10_250.0),
            win_rate: Some(0.55),
            sharpe: Some(1.2),
            max_dd: Some(0.08),
            trades: Some(42),
            ..Metrics::default()
        }
    }

    fn position(coin: &str) -> Position {
        serde_json::from_value(serde_json::json!({
            "side": "long", "coin": coin, "entry": 3400.0, "qty": 0.5
        }))
        .unwrap()
    }

    fn prices(btc: f64) -> SnapshotPatch {
        SnapshotPatch::prices(BTreeMap::from([("BTC".to_string(), btc)]))
    }

    #[test]
    fn test_absent_fields_keep_prior_values() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let mut p1 = SnapshotPatch::metrics(metrics());
        p1.merge(prices(100.0));
        agg.apply(p1);

        let touched = agg.apply(SnapshotPatch::positions(vec![position("ETH")]));
        assert_eq!(touched, vec![SnapshotField::Positions]);

        let view = agg.latest();
        assert_eq!(view.snapshot.metrics, Some(metrics()));
        assert_eq!(view.snapshot.prices.as_ref().unwrap()["BTC"], 100.0);
        assert_eq!(view.snapshot.positions.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn test_present_fields_fully_replaced() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        agg.apply(SnapshotPatch::positions(vec![position("ETH"), position("BTC")]));
        agg.apply(SnapshotPatch::positions(vec![position("SOL")]));

        let view = agg.latest();
        let positions = view.snapshot.positions.as_ref().unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].coin, "SOL");
        assert_eq!(positions[0].side, PositionSide::Long);
    }

    #[test]
    fn test_last_write_wins_across_sources() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        agg.apply(prices(1.0));
        agg.apply(prices(2.0));
        assert_eq!(agg.latest().snapshot.prices.as_ref().unwrap()["BTC"], 2.0);
    }

    #[test]
    fn test_never_received_is_insufficient() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let view = agg.latest();
        for field in SnapshotField::ALL {
            assert_eq!(view.freshness(field), Freshness::Insufficient, "{field}");
        }
        assert_eq!(view.lights, StatusLights::default());
    }

    #[test]
    fn test_empty_positions_insufficient() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        agg.apply(SnapshotPatch::positions(Vec::new()));
        let view = agg.latest();
        assert_eq!(
            view.freshness(SnapshotField::Positions),
            Freshness::Insufficient
        );
        assert_eq!(view.snapshot.positions, Some(Vec::new()));
    }

    #[test]
    fn test_metrics_meta_flag_insufficient() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let mut m = metrics();
        m.meta = Some(DataMeta {
            insufficient: true,
            reason: Some("no_trades".to_string()),
            ..DataMeta::default()
        });
        agg.apply(SnapshotPatch::metrics(m));
        assert_eq!(
            agg.latest().freshness(SnapshotField::Metrics),
            Freshness::Insufficient
        );

        agg.apply(SnapshotPatch::metrics(metrics()));
        assert_eq!(
            agg.latest().freshness(SnapshotField::Metrics),
            Freshness::Fresh
        );
    }

    #[test]
    fn test_fields_age_into_stale() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let t0 = Utc::now();
        agg.apply_at(prices(5.0), t0);
        assert_eq!(
            agg.latest().freshness(SnapshotField::Prices),
            Freshness::Fresh
        );

        agg.reclassify_at(t0 + ChronoDuration::seconds(31));
        let view = agg.latest();
        assert_eq!(view.freshness(SnapshotField::Prices), Freshness::Stale);
        assert!(!view.freshness(SnapshotField::Prices).is_insufficient());
    }

    #[test]
    fn test_equity_staleness_from_last_point() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let now = Utc::now();
        let old = Timestamp::new(now - ChronoDuration::hours(2));
        let older = Timestamp::new(now - ChronoDuration::hours(3));
        agg.apply_at(
            SnapshotPatch::equity(vec![
                EquityPoint::new(older, 10_000.0),
                EquityPoint::new(old, 10_100.0),
            ]),
            now,
        );
        assert_eq!(
            agg.latest().freshness(SnapshotField::Equity),
            Freshness::Stale
        );

        agg.apply_at(
            SnapshotPatch::equity(vec![EquityPoint::new(Timestamp::new(now), 10_200.0)]),
            now,
        );
        assert_eq!(
            agg.latest().freshness(SnapshotField::Equity),
            Freshness::Fresh
        );
    }

    #[test]
    fn test_market_entries_classified_per_symbol() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let now = Utc::now();
        let live = MarketEntry {
            micro: Some(MarketMicro {
                spread_bps: Some(1.5),
                obi: Some(0.2),
                rtn_5s: None,
            }),
            meta: DataMeta::default(),
            last_update_ms: Some(now.timestamp_millis() - 1_000),
        };
        let mut patch = SnapshotPatch::market("BTC", live);
        patch.merge(SnapshotPatch::market(
            "ETH",
            MarketEntry::insufficient("stale_data"),
        ));
        agg.apply_at(patch, now);

        let view = agg.latest();
        assert_eq!(view.market_freshness("BTC"), Freshness::Fresh);
        assert_eq!(view.market_freshness("ETH"), Freshness::Insufficient);
        assert_eq!(view.freshness(SnapshotField::Market), Freshness::Fresh);

        agg.retain_market_symbols(&["ETH".to_string()]);
        let view = agg.latest();
        assert!(!view.snapshot.market.contains_key("BTC"));
        assert_eq!(
            view.freshness(SnapshotField::Market),
            Freshness::Insufficient
        );
    }

    #[test]
    fn test_status_lights_derived_on_apply() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let status = BTreeMap::from([
            ("bot".to_string(), "mock".to_string()),
            ("market".to_string(), "ok".to_string()),
            ("ws".to_string(), "weird".to_string()),
        ]);
        agg.apply(SnapshotPatch::status(status));

        let view = agg.latest();
        assert_eq!(view.lights.bot, HealthTier::Degraded);
        assert_eq!(view.lights.market, HealthTier::Healthy);
        assert_eq!(view.lights.ws, HealthTier::Unknown);
        assert_eq!(view.lights.db, HealthTier::Unknown);
        assert_eq!(view.freshness(SnapshotField::Status), Freshness::Fresh);
    }

    #[tokio::test]
    async fn test_subscribers_notified_on_apply_and_connection_change() {
        let agg = StateAggregator::new(FreshnessPolicy::default());
        let mut rx = agg.subscribe();

        agg.apply(prices(9.0));
        let view = rx.recv().await.unwrap();
        assert!(view.snapshot.prices.is_some());

        agg.set_connection_state(ConnectionState::Connected);
        let view = rx.recv().await.unwrap();
        assert_eq!(view.connection, ConnectionState::Connected);

        // Unchanged state publishes nothing
        agg.set_connection_state(ConnectionState::Connected);
        agg.apply(SnapshotPatch::default());
        assert!(rx.try_recv().is_err());
    }
}
