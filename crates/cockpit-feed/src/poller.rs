//! Deduplicating interval poller.
//!
//! Every keyed operation runs on its own tokio task and is recorded in an
//! in-flight map until it settles. A caller asking for a key that is already
//! in flight joins the pending operation instead of starting a new one, so at
//! most one network request per key is outstanding at any time.

use crate::error::{PollError, PollResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Shared handle to an in-flight poll. Every clone resolves to the same result.
pub type PollHandle<T> = Shared<BoxFuture<'static, PollResult<T>>>;

type PollFactory<T> = Arc<dyn Fn() -> BoxFuture<'static, PollResult<T>> + Send + Sync>;

/// Outcome of one registry-wide poll.
#[derive(Debug, Clone)]
pub struct TickReport<T> {
    /// Per-key outcome, in key order.
    pub outcomes: Vec<(String, PollResult<T>)>,
}

impl<T> TickReport<T> {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn into_values(self) -> impl Iterator<Item = T> {
        self.outcomes.into_iter().filter_map(|(_, r)| r.ok())
    }
}

/// Keyed poller with in-flight deduplication and a repeating timer.
pub struct Poller<T> {
    in_flight: Arc<DashMap<String, PollHandle<T>>>,
    tasks: RwLock<BTreeMap<String, PollFactory<T>>>,
    timer: Mutex<Option<CancellationToken>>,
    dedupe_hits: AtomicU64,
}

impl<T> Default for Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Poller<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(DashMap::new()),
            tasks: RwLock::new(BTreeMap::new()),
            timer: Mutex::new(None),
            dedupe_hits: AtomicU64::new(0),
        }
    }

    /// Run `operation` for `key` unless one is already pending, in which case
    /// the pending handle is returned and `operation` is never called.
    ///
    /// The operation runs to completion even if every handle is dropped. Its
    /// key is cleared from the in-flight map before the handle resolves.
    pub fn with_dedupe<F, Fut>(&self, key: &str, operation: F) -> PollHandle<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PollResult<T>> + Send + 'static,
    {
        match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                self.dedupe_hits.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Joining in-flight poll");
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                let fut = operation();
                let in_flight = Arc::clone(&self.in_flight);
                let owned_key = key.to_string();
                let task = tokio::spawn(async move {
                    let result = fut.await;
                    in_flight.remove(&owned_key);
                    result
                });
                let handle = async move {
                    task.await
                        .unwrap_or_else(|e| Err(PollError::Aborted(e.to_string())))
                }
                .boxed()
                .shared();
                entry.insert(handle.clone());
                handle
            }
        }
    }

    /// Pending handle for `key`, if any.
    pub fn in_flight(&self, key: &str) -> Option<PollHandle<T>> {
        self.in_flight.get(key).map(|h| h.clone())
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Calls that joined an existing request instead of starting one.
    pub fn dedupe_hits(&self) -> u64 {
        self.dedupe_hits.load(Ordering::Relaxed)
    }

    /// Register (or replace) the task polled under `key`.
    pub fn register<F, Fut>(&self, key: impl Into<String>, factory: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PollResult<T>> + Send + 'static,
    {
        let key = key.into();
        let factory: PollFactory<T> = Arc::new(move || factory().boxed());
        if self.tasks.write().insert(key.clone(), factory).is_some() {
            debug!(%key, "Replaced poll task");
        } else {
            debug!(%key, "Registered poll task");
        }
    }

    /// Remove the task under `key`. An in-flight request for it still completes.
    pub fn unregister(&self, key: &str) -> bool {
        let removed = self.tasks.write().remove(key).is_some();
        if removed {
            debug!(key, "Unregistered poll task");
        }
        removed
    }

    pub fn keys(&self) -> Vec<String> {
        self.tasks.read().keys().cloned().collect()
    }

    /// Poll one registered key through the dedupe path.
    pub fn poll(&self, key: &str) -> PollHandle<T> {
        let factory = self.tasks.read().get(key).cloned();
        match factory {
            Some(factory) => self.with_dedupe(key, || factory()),
            None => {
                let err = PollError::NotRegistered(key.to_string());
                async move { Err(err) }.boxed().shared()
            }
        }
    }

    /// Poll the given keys together and wait for all of them to settle.
    /// One failure never cancels the others.
    pub async fn poll_keys(&self, keys: &[String]) -> TickReport<T> {
        let handles: Vec<_> = keys.iter().map(|k| self.poll(k)).collect();
        let results = join_all(handles).await;

        let outcomes: Vec<_> = keys.iter().cloned().zip(results).collect();
        for (key, result) in &outcomes {
            if let Err(e) = result {
                warn!(%key, error = %e, "Poll failed");
            }
        }
        TickReport { outcomes }
    }

    /// Poll every registered key.
    pub async fn poll_all(&self) -> TickReport<T> {
        let keys = self.keys();
        self.poll_keys(&keys).await
    }

    /// Start the repeating timer. `tick` runs once per `interval`, each run on
    /// its own task so a slow tick never delays the next. Starting again
    /// replaces the previous timer.
    pub fn start<F, Fut>(&self, interval: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        if let Some(previous) = self.timer.lock().replace(token.clone()) {
            previous.cancel();
        }
        info!(interval_ms = interval.as_millis() as u64, "Poll timer started");

        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        trace!("Poll tick");
                        tokio::spawn(tick());
                    }
                    () = token.cancelled() => break,
                }
            }
        });
    }

    /// Stop the timer. Idempotent; in-flight requests are not cancelled.
    pub fn stop(&self) {
        if let Some(token) = self.timer.lock().take() {
            token.cancel();
            info!("Poll timer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.timer.lock().is_some()
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        if let Some(token) = self.timer.get_mut().take() {
            token.cancel();
        }
    }
}
