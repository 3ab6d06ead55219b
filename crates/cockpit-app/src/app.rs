//! Application: owns the session and the operator controls.

use crate::config::AppConfig;
use crate::controls::Controls;
use crate::error::AppResult;
use crate::session::Session;
use cockpit_core::{Freshness, SnapshotField};
use cockpit_feed::ReconciledView;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct Application {
    session: Arc<Session>,
    controls: Controls,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let session = Session::new(config)?;
        let controls = Controls::new(Arc::clone(&session));
        Ok(Self { session, controls })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    /// Poll every registered key once without opening the push channel.
    pub async fn run_once(&self) -> AppResult<Arc<ReconciledView>> {
        let report = self.session.tick().await;
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Single poll completed"
        );
        Ok(self.session.aggregator().latest())
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.session.init().await?;

        let mut status_interval = tokio::time::interval(STATUS_LOG_INTERVAL);
        info!("Entering main loop");
        loop {
            tokio::select! {
                _ = status_interval.tick() => {
                    log_status(&self.session.aggregator().latest());
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.session.teardown().await;
        Ok(())
    }
}

fn log_status(view: &ReconciledView) {
    let count = |wanted: Freshness| {
        SnapshotField::ALL
            .iter()
            .filter(|f| view.freshness(**f) == wanted)
            .count()
    };
    info!(
        connection = %view.connection,
        fresh = count(Freshness::Fresh),
        stale = count(Freshness::Stale),
        insufficient = count(Freshness::Insufficient),
        "Status"
    );
}
