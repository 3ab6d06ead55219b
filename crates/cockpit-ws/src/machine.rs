//! Connection state machine.
//!
//! Pure transition logic, independent of any transport. The driver in
//! [`crate::connection`] feeds it transport events and executes the returned
//! actions, which keeps reconnection behaviour testable with synthetic events.
//!
//! Transitions:
//!
//! ```text
//! Disconnected/Error --Connect--------> Connecting   [OpenTransport]
//! Disconnected/Error --ReconnectDue---> Connecting   [OpenTransport]
//! Connecting ---------Opened----------> Connected    [SendSubscribe]
//! Connecting/Connected --Closed-------> Disconnected [ScheduleReconnect]
//! Connecting/Connected --Failed-------> Error        [ScheduleReconnect]
//! any ----------------Teardown--------> Disconnected [CancelReconnect?, CloseTransport?]
//! ```
//!
//! At most one reconnect is pending at any time. A transport that reports both
//! a failure and a close for the same drop schedules a single reconnect.

use crate::message::SubscribeRequest;
use cockpit_core::ConnectionState;
use std::time::Duration;
use tracing::debug;

/// Transport and timer events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Explicit connect request.
    Connect,
    Opened,
    Closed { code: u16, reason: String },
    /// Transport error, including failure to construct the transport.
    Failed(String),
    /// The scheduled reconnect delay elapsed.
    ReconnectDue,
    /// Session teardown. Terminal.
    Teardown,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    OpenTransport,
    SendSubscribe(SubscribeRequest),
    ScheduleReconnect(Duration),
    CancelReconnect,
    CloseTransport,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    reconnect_delay: Duration,
    subscribe: SubscribeRequest,
    reconnect_pending: bool,
    reconnects_scheduled: u64,
    torn_down: bool,
}

impl ConnectionMachine {
    pub fn new(reconnect_delay: Duration, subscribe: SubscribeRequest) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            reconnect_delay,
            subscribe,
            reconnect_pending: false,
            reconnects_scheduled: 0,
            torn_down: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    /// Total reconnects scheduled over the machine's lifetime.
    pub fn reconnects_scheduled(&self) -> u64 {
        self.reconnects_scheduled
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Apply an event and return the actions the driver must perform.
    pub fn handle(&mut self, event: ConnectionEvent) -> Vec<ConnectionAction> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        if self.torn_down {
            debug!(?event, "Connection torn down, ignoring event");
            return Vec::new();
        }

        match (self.state, event) {
            (state, E::Teardown) => {
                let mut actions = Vec::new();
                if self.reconnect_pending {
                    self.reconnect_pending = false;
                    actions.push(ConnectionAction::CancelReconnect);
                }
                if matches!(state, S::Connecting | S::Connected) {
                    actions.push(ConnectionAction::CloseTransport);
                }
                self.state = S::Disconnected;
                self.torn_down = true;
                actions
            }
            (S::Disconnected | S::Error, E::Connect) => {
                let mut actions = Vec::new();
                if self.reconnect_pending {
                    self.reconnect_pending = false;
                    actions.push(ConnectionAction::CancelReconnect);
                }
                self.state = S::Connecting;
                actions.push(ConnectionAction::OpenTransport);
                actions
            }
            (S::Disconnected | S::Error, E::ReconnectDue) if self.reconnect_pending => {
                self.reconnect_pending = false;
                self.state = S::Connecting;
                vec![ConnectionAction::OpenTransport]
            }
            (S::Connecting, E::Opened) => {
                self.state = S::Connected;
                vec![ConnectionAction::SendSubscribe(self.subscribe.clone())]
            }
            (S::Connecting | S::Connected, E::Closed { .. }) => {
                self.state = S::Disconnected;
                self.schedule_reconnect()
            }
            (S::Connecting | S::Connected, E::Failed(_)) => {
                self.state = S::Error;
                self.schedule_reconnect()
            }
            (state, event) => {
                debug!(%state, ?event, "Ignoring event in current state");
                Vec::new()
            }
        }
    }

    fn schedule_reconnect(&mut self) -> Vec<ConnectionAction> {
        self.reconnect_pending = true;
        self.reconnects_scheduled += 1;
        vec![ConnectionAction::ScheduleReconnect(self.reconnect_delay)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(3000);

    fn machine() -> ConnectionMachine {
        ConnectionMachine::new(DELAY, SubscribeRequest::default())
    }

    fn closed() -> ConnectionEvent {
        ConnectionEvent::Closed {
            code: 1006,
            reason: "abnormal".to_string(),
        }
    }

    #[test]
    fn test_connect_open_subscribes_once() {
        let mut m = machine();
        assert_eq!(
            m.handle(ConnectionEvent::Connect),
            vec![ConnectionAction::OpenTransport]
        );
        assert_eq!(m.state(), ConnectionState::Connecting);

        let actions = m.handle(ConnectionEvent::Opened);
        assert_eq!(
            actions,
            vec![ConnectionAction::SendSubscribe(SubscribeRequest::default())]
        );
        assert_eq!(m.state(), ConnectionState::Connected);

        // A duplicate open is not a second subscription
        assert!(m.handle(ConnectionEvent::Opened).is_empty());
    }

    #[test]
    fn test_every_close_schedules_fixed_delay_reconnect() {
        let mut m = machine();
        m.handle(ConnectionEvent::Connect);

        for n in 1..=25u64 {
            m.handle(ConnectionEvent::Opened);
            let actions = m.handle(closed());
            assert_eq!(actions, vec![ConnectionAction::ScheduleReconnect(DELAY)]);
            assert_eq!(m.state(), ConnectionState::Disconnected);
            assert_eq!(m.reconnects_scheduled(), n);

            assert_eq!(
                m.handle(ConnectionEvent::ReconnectDue),
                vec![ConnectionAction::OpenTransport]
            );
        }
    }

    #[test]
    fn test_failure_then_close_schedules_single_reconnect() {
        let mut m = machine();
        m.handle(ConnectionEvent::Connect);
        m.handle(ConnectionEvent::Opened);

        let actions = m.handle(ConnectionEvent::Failed("reset by peer".to_string()));
        assert_eq!(actions, vec![ConnectionAction::ScheduleReconnect(DELAY)]);
        assert_eq!(m.state(), ConnectionState::Error);

        assert!(m.handle(closed()).is_empty());
        assert_eq!(m.reconnects_scheduled(), 1);
        assert!(m.reconnect_pending());
    }

    #[test]
    fn test_construction_failure_reports_error_and_retries() {
        let mut m = machine();
        m.handle(ConnectionEvent::Connect);
        let actions = m.handle(ConnectionEvent::Failed("connection refused".to_string()));
        assert_eq!(m.state(), ConnectionState::Error);
        assert_eq!(actions, vec![ConnectionAction::ScheduleReconnect(DELAY)]);
    }

    #[test]
    fn test_reconnect_due_without_pending_is_ignored() {
        let mut m = machine();
        assert!(m.handle(ConnectionEvent::ReconnectDue).is_empty());
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_manual_connect_cancels_pending_reconnect() {
        let mut m = machine();
        m.handle(ConnectionEvent::Connect);
        m.handle(closed());
        assert!(m.reconnect_pending());

        let actions = m.handle(ConnectionEvent::Connect);
        assert_eq!(
            actions,
            vec![
                ConnectionAction::CancelReconnect,
                ConnectionAction::OpenTransport
            ]
        );
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn test_teardown_cancels_pending_and_is_terminal() {
        let mut m = machine();
        m.handle(ConnectionEvent::Connect);
        m.handle(closed());

        let actions = m.handle(ConnectionEvent::Teardown);
        assert_eq!(actions, vec![ConnectionAction::CancelReconnect]);
        assert!(m.is_torn_down());
        assert_eq!(m.state(), ConnectionState::Disconnected);

        assert!(m.handle(ConnectionEvent::ReconnectDue).is_empty());
        assert!(m.handle(ConnectionEvent::Connect).is_empty());
    }

    #[test]
    fn test_teardown_while_connected_closes_transport() {
        let mut m = machine();
        m.handle(ConnectionEvent::Connect);
        m.handle(ConnectionEvent::Opened);
        assert_eq!(
            m.handle(ConnectionEvent::Teardown),
            vec![ConnectionAction::CloseTransport]
        );
        assert!(!m.reconnect_pending());
    }
}
