//! Operator actions: order ticket, kill switch and AI decide-and-execute.
//!
//! Every action reports its outcome as a notification. A rejected action
//! restores the control that triggered it.

use crate::error::{AppError, AppResult};
use crate::session::Session;
use cockpit_api::{DecisionResponse, OrderAck, OrderRequest};
use cockpit_core::{KillSwitchState, SnapshotPatch};
use cockpit_telemetry::Metrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub struct Controls {
    session: Arc<Session>,
    ticket_enabled: AtomicBool,
    deciding: AtomicBool,
}

impl Controls {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            ticket_enabled: AtomicBool::new(true),
            deciding: AtomicBool::new(false),
        }
    }

    /// The order ticket accepts a new submission.
    pub fn ticket_enabled(&self) -> bool {
        self.ticket_enabled.load(Ordering::Acquire)
    }

    /// Submit an order from the ticket.
    ///
    /// The ticket is disabled while the request is outstanding and enabled
    /// again whatever the outcome. A fill refreshes the trading data.
    pub async fn place_order(&self, order: OrderRequest) -> AppResult<OrderAck> {
        if !self.ticket_enabled.swap(false, Ordering::AcqRel) {
            return Err(AppError::Busy("order"));
        }
        info!(
            symbol = %order.symbol,
            side = %order.side,
            notional_usd = order.notional_usd,
            "Submitting order"
        );
        let result = self.session.client().place_order(&order).await;
        self.ticket_enabled.store(true, Ordering::Release);

        let notifier = self.session.notifier();
        match result {
            Ok(ack) => {
                Metrics::action("order", true);
                notifier.success(format!(
                    "Order {} filled @ {}{}",
                    ack.order_id,
                    ack.avg_px,
                    if ack.mock { " (mock)" } else { "" }
                ));
                self.session.refresh_trading().await;
                Ok(ack)
            }
            Err(e) => {
                Metrics::action("order", false);
                notifier.error(format!("Order failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Toggle the kill switch.
    ///
    /// The new state is shown before the request completes and reverted when
    /// the request fails.
    pub async fn set_kill_switch(&self, enabled: bool) -> AppResult<KillSwitchState> {
        let aggregator = self.session.aggregator();
        let previous = aggregator
            .latest()
            .snapshot
            .kill_switch
            .unwrap_or(KillSwitchState { enabled: !enabled });
        aggregator.apply(SnapshotPatch::kill_switch(KillSwitchState { enabled }));

        let notifier = self.session.notifier();
        match self.session.client().set_kill_switch(enabled).await {
            Ok(state) => {
                Metrics::action("kill_switch", true);
                aggregator.apply(SnapshotPatch::kill_switch(state));
                notifier.info(if state.enabled {
                    "Trading enabled"
                } else {
                    "Trading halted"
                });
                Ok(state)
            }
            Err(e) => {
                Metrics::action("kill_switch", false);
                aggregator.apply(SnapshotPatch::kill_switch(previous));
                notifier.error(format!("Kill switch update failed: {e}"));
                Err(e.into())
            }
        }
    }

    /// Ask the service's agent to decide for the selected symbols and execute.
    pub async fn decide_and_execute(&self) -> AppResult<DecisionResponse> {
        if self.deciding.swap(true, Ordering::AcqRel) {
            return Err(AppError::Busy("decide"));
        }
        let symbols = self.session.subscription().symbols().to_vec();
        let result = self.session.client().decide_and_execute(&symbols).await;
        self.deciding.store(false, Ordering::Release);

        let notifier = self.session.notifier();
        match result {
            Ok(response) => {
                Metrics::action("decide", true);
                if response
                    .execution
                    .as_ref()
                    .is_some_and(|e| e.error.is_some())
                {
                    notifier.error(response.summary());
                } else {
                    notifier.info(response.summary());
                }
                if response.executed() {
                    self.session.refresh_trading().await;
                }
                Ok(response)
            }
            Err(e) => {
                Metrics::action("decide", false);
                notifier.error(format!("AI decision failed: {e}"));
                Err(e.into())
            }
        }
    }
}
