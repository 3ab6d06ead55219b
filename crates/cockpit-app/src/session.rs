//! One cockpit session: push channel, poller and aggregator wired together.
//!
//! Lifecycle is `new` → `init` → `teardown`. A session is single use.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::notify::Notifier;
use crate::poll_plan::{base_keys, market_key, trading_keys, PollKey, PollPlan};
use cockpit_api::CockpitClient;
use cockpit_core::{
    ConnectionState, DecodedPatch, SnapshotField, SnapshotPatch, SubscriptionSet,
};
use cockpit_feed::{PollError, Poller, StateAggregator, TickReport};
use cockpit_telemetry::Metrics;
use cockpit_ws::{ConnectionConfig, ConnectionManager};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 256;
const WS_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const PUMP_DRAIN_GRACE: Duration = Duration::from_secs(2);

pub struct Session {
    config: AppConfig,
    client: Arc<CockpitClient>,
    aggregator: Arc<StateAggregator>,
    poller: Poller<SnapshotPatch>,
    connection: Arc<ConnectionManager>,
    subscription: RwLock<SubscriptionSet>,
    notifier: Arc<Notifier>,
    plan: PollPlan,
    update_rx: Mutex<Option<mpsc::Receiver<DecodedPatch>>>,
    ws_task: Mutex<Option<JoinHandle<()>>>,
    pump_task: Mutex<Option<JoinHandle<()>>>,
    pump_stop: CancellationToken,
    watcher_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Build a session. Nothing runs until [`init`](Self::init).
    pub fn new(config: AppConfig) -> AppResult<Arc<Self>> {
        config.validate()?;
        let subscription = config.subscription()?;
        let client = Arc::new(CockpitClient::new(&config.api)?);
        let aggregator = Arc::new(StateAggregator::new(config.freshness.clone()));

        let (update_tx, update_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let connection = Arc::new(ConnectionManager::new(
            ConnectionConfig {
                url: config.ws_url.clone(),
                reconnect_delay_ms: config.reconnect_delay_ms,
                channels: config.channels.clone(),
            },
            update_tx,
        ));

        let session = Arc::new(Self {
            plan: PollPlan::new(&config.poll),
            config,
            client,
            aggregator,
            poller: Poller::new(),
            connection,
            subscription: RwLock::new(subscription.clone()),
            notifier: Arc::new(Notifier::new()),
            update_rx: Mutex::new(Some(update_rx)),
            ws_task: Mutex::new(None),
            pump_task: Mutex::new(None),
            pump_stop: CancellationToken::new(),
            watcher_task: Mutex::new(None),
        });

        for key in base_keys() {
            session.register_key(key);
        }
        for symbol in subscription.symbols() {
            session.register_key(PollKey::Market(symbol.clone()));
        }
        Ok(session)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<CockpitClient> {
        &self.client
    }

    pub fn aggregator(&self) -> &Arc<StateAggregator> {
        &self.aggregator
    }

    pub fn notifier(&self) -> &Arc<Notifier> {
        &self.notifier
    }

    pub fn poller(&self) -> &Poller<SnapshotPatch> {
        &self.poller
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscription(&self) -> SubscriptionSet {
        self.subscription.read().clone()
    }

    /// Start the push channel, run the first poll tick and start the timer.
    pub async fn init(self: &Arc<Self>) -> AppResult<()> {
        let update_rx = self.update_rx.lock().take().ok_or(AppError::AlreadyStarted)?;
        info!(
            ws_url = %self.config.ws_url,
            base_url = %self.client.base_url(),
            symbols = ?self.subscription().symbols(),
            "Starting session"
        );

        let connection = Arc::clone(&self.connection);
        *self.ws_task.lock() = Some(tokio::spawn(async move {
            connection.run().await;
        }));

        *self.pump_task.lock() = Some(tokio::spawn(pump_updates(
            update_rx,
            Arc::clone(&self.aggregator),
            self.pump_stop.clone(),
        )));
        *self.watcher_task.lock() = Some(tokio::spawn(watch_connection(
            Arc::clone(&self.connection),
            Arc::clone(&self.aggregator),
        )));

        self.tick().await;

        let weak: Weak<Self> = Arc::downgrade(self);
        self.poller.start(
            Duration::from_millis(self.config.poll.interval_ms),
            move || {
                let weak = weak.clone();
                async move {
                    if let Some(session) = weak.upgrade() {
                        session.tick().await;
                    }
                }
            },
        );
        Ok(())
    }

    /// Stop the timer and the push channel. In-flight polls settle on their
    /// own and updates already received from the push channel are applied.
    pub async fn teardown(&self) {
        info!("Tearing down session");
        self.poller.stop();
        self.connection.shutdown();

        let ws_task = self.ws_task.lock().take();
        if let Some(mut handle) = ws_task {
            if tokio::time::timeout(WS_SHUTDOWN_GRACE, &mut handle).await.is_err() {
                warn!("Connection manager did not stop in time, aborting");
                handle.abort();
            }
        }

        self.pump_stop.cancel();
        let pump_task = self.pump_task.lock().take();
        if let Some(mut handle) = pump_task {
            if tokio::time::timeout(PUMP_DRAIN_GRACE, &mut handle).await.is_err() {
                warn!("Update pump did not drain in time, aborting");
                handle.abort();
            }
        }
        if let Some(handle) = self.watcher_task.lock().take() {
            handle.abort();
        }
        Metrics::ws_messages_dropped(self.connection.messages_dropped());
        self.aggregator.set_connection_state(ConnectionState::Disconnected);
    }

    /// Poll every due key together and apply the merged result once.
    pub async fn tick(&self) -> TickReport<SnapshotPatch> {
        let keys = self
            .plan
            .due_keys(&self.poller.keys(), self.connection.state());
        debug!(keys = ?keys, "Poll tick");
        let report = self.poller.poll_keys(&keys).await;
        self.apply_report(&report);
        report
    }

    /// Poll the given keys now, outside the timer, and apply the result.
    pub async fn refresh(&self, keys: &[String]) -> TickReport<SnapshotPatch> {
        let report = self.poller.poll_keys(keys).await;
        self.apply_report(&report);
        report
    }

    /// Refresh positions, trades and metrics after a trading action.
    pub async fn refresh_trading(&self) -> TickReport<SnapshotPatch> {
        self.refresh(&trading_keys()).await
    }

    /// Replace the symbol selection.
    ///
    /// Market tasks for deselected symbols are unregistered and their entries
    /// dropped; newly selected symbols are registered and fetched at once.
    pub async fn select_symbols(&self, symbols: SubscriptionSet) -> TickReport<SnapshotPatch> {
        let (added, removed) = {
            let mut current = self.subscription.write();
            let diff = symbols.diff(&current);
            *current = symbols.clone();
            diff
        };

        for symbol in &removed {
            self.poller.unregister(&market_key(symbol));
        }
        for symbol in &added {
            self.register_key(PollKey::Market(symbol.clone()));
        }
        self.aggregator.retain_market_symbols(symbols.symbols());
        info!(
            primary = %symbols.primary(),
            added = ?added,
            removed = ?removed,
            "Symbol selection changed"
        );

        let keys: Vec<String> = added.iter().map(|s| market_key(s)).collect();
        self.refresh(&keys).await
    }

    fn register_key(&self, key: PollKey) {
        let name = key.as_key();
        let client = Arc::clone(&self.client);
        let poll = self.config.poll.clone();
        self.poller.register(name, move || {
            let client = Arc::clone(&client);
            let poll = poll.clone();
            let key = key.clone();
            async move {
                key.fetch(&client, &poll)
                    .await
                    .map_err(|e| PollError::Failed(e.to_string()))
            }
        });
    }

    fn apply_report(&self, report: &TickReport<SnapshotPatch>) {
        let mut merged = SnapshotPatch::default();
        for (key, result) in &report.outcomes {
            Metrics::poll_outcome(key, result.is_ok());
            if let Ok(patch) = result {
                merged.merge(patch.clone());
            }
        }

        // A market poll issued before a deselection may land after it.
        if let Some(market) = merged.market.as_mut() {
            let subscription = self.subscription.read();
            market.retain(|symbol, _| subscription.contains(symbol));
            if market.is_empty() {
                merged.market = None;
            }
        }

        if merged.is_empty() {
            self.aggregator.reclassify();
        } else {
            self.aggregator.apply(merged);
            Metrics::snapshot_applied("poll");
        }

        Metrics::ws_messages_dropped(self.connection.messages_dropped());
        Metrics::poll_dedupe_hits(self.poller.dedupe_hits());
        Metrics::poll_in_flight(self.poller.in_flight_count());
        let view = self.aggregator.latest();
        for field in SnapshotField::ALL {
            Metrics::field_freshness(field, view.freshness(field));
        }
        debug!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Poll tick applied"
        );
    }
}

/// Apply push updates in arrival order until `stop`, then apply whatever is
/// still queued and exit.
async fn pump_updates(
    mut rx: mpsc::Receiver<DecodedPatch>,
    aggregator: Arc<StateAggregator>,
    stop: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Some(decoded) => apply_push(&aggregator, decoded),
                None => {
                    debug!("Update channel closed");
                    return;
                }
            },
            () = stop.cancelled() => break,
        }
    }

    let mut drained = 0usize;
    while let Ok(decoded) = rx.try_recv() {
        apply_push(&aggregator, decoded);
        drained += 1;
    }
    debug!(drained, "Update pump stopped");
}

fn apply_push(aggregator: &StateAggregator, decoded: DecodedPatch) {
    for rejection in &decoded.rejected {
        Metrics::patch_field_rejected(rejection.field, "push");
    }
    if !decoded.patch.is_empty() {
        aggregator.apply(decoded.patch);
        Metrics::snapshot_applied("push");
    }
}

/// Mirror push channel state into the view and metrics.
async fn watch_connection(connection: Arc<ConnectionManager>, aggregator: Arc<StateAggregator>) {
    let mut rx = connection.subscribe_state();
    let mut previous = *rx.borrow_and_update();
    aggregator.set_connection_state(previous);
    Metrics::ws_state_set(previous);

    while rx.changed().await.is_ok() {
        let state = *rx.borrow_and_update();
        if previous.is_connected() && !state.is_connected() {
            warn!(state = %state, "Push channel lost, polling all fields");
        }
        if matches!(state, ConnectionState::Disconnected | ConnectionState::Error)
            && !connection.is_shutdown()
        {
            Metrics::ws_reconnect();
        }
        aggregator.set_connection_state(state);
        Metrics::ws_state_set(state);
        Metrics::ws_messages_dropped(connection.messages_dropped());
        previous = state;
    }
}
