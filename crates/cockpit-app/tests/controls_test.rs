//! Operator actions against a local backend.

mod common;

use cockpit_api::{OrderRequest, OrderSide};
use cockpit_app::{AppError, Application, NotificationLevel};
use common::{MockBackend, Script};
use serde_json::json;

fn order() -> OrderRequest {
    OrderRequest {
        symbol: "ETH".to_string(),
        side: OrderSide::Buy,
        notional_usd: 25.0,
        reduce_only: false,
    }
}

#[tokio::test]
async fn test_order_success_notifies_and_refreshes_trading_data() {
    let backend = MockBackend::start(Script {
        positions: json!([{"side": "long", "coin": "ETH", "entry": 1800.5, "qty": 0.01}]),
        ..Script::default()
    })
    .await;
    let app = Application::new(backend.config(&["ETH"])).unwrap();

    let ack = app.controls().place_order(order()).await.unwrap();
    assert_eq!(ack.order_id, "abc");

    let note = app.session().notifier().latest().unwrap();
    assert_eq!(note.level, NotificationLevel::Success);
    assert!(note.message.contains("abc"));
    assert!(note.message.contains("1800.5"));

    assert_eq!(backend.hits("/positions"), 1);
    assert_eq!(backend.hits("/trades"), 1);
    assert_eq!(backend.hits("/metrics"), 1);
    let view = app.session().aggregator().latest();
    assert_eq!(view.snapshot.positions.as_ref().map(Vec::len), Some(1));
    assert!(app.controls().ticket_enabled());
}

#[tokio::test]
async fn test_order_rejection_notifies_and_reenables_ticket() {
    let backend = MockBackend::start(Script {
        order: (400, json!({"detail": {"error": "insufficient_margin"}})),
        ..Script::default()
    })
    .await;
    let app = Application::new(backend.config(&["ETH"])).unwrap();

    let err = app.controls().place_order(order()).await.unwrap_err();
    assert!(matches!(err, AppError::Api(_)));

    let note = app.session().notifier().latest().unwrap();
    assert_eq!(note.level, NotificationLevel::Error);
    assert!(note.message.contains("insufficient_margin"));
    assert!(app.controls().ticket_enabled());
    assert_eq!(backend.hits("/positions"), 0);
}

#[tokio::test]
async fn test_kill_switch_applies_confirmed_state() {
    let backend = MockBackend::start(Script::default()).await;
    let app = Application::new(backend.config(&["BTC"])).unwrap();

    let state = app.controls().set_kill_switch(false).await.unwrap();
    assert!(!state.enabled);
    let view = app.session().aggregator().latest();
    assert_eq!(view.snapshot.kill_switch.map(|k| k.enabled), Some(false));
    assert_eq!(
        app.session().notifier().latest().unwrap().message,
        "Trading halted"
    );
}

#[tokio::test]
async fn test_kill_switch_reverts_on_rejection() {
    let backend = MockBackend::start(Script {
        kill_switch_post: Some((500, json!({"detail": "kill switch unavailable"}))),
        ..Script::default()
    })
    .await;
    let app = Application::new(backend.config(&["BTC"])).unwrap();
    app.run_once().await.unwrap();
    assert_eq!(
        app.session().aggregator().latest().snapshot.kill_switch.map(|k| k.enabled),
        Some(true)
    );

    let mut views = app.session().aggregator().subscribe();
    assert!(app.controls().set_kill_switch(false).await.is_err());

    // Optimistic state first, then the revert
    let optimistic = views.recv().await.unwrap();
    assert_eq!(optimistic.snapshot.kill_switch.map(|k| k.enabled), Some(false));
    let reverted = views.recv().await.unwrap();
    assert_eq!(reverted.snapshot.kill_switch.map(|k| k.enabled), Some(true));

    let note = app.session().notifier().latest().unwrap();
    assert!(note.message.contains("kill switch unavailable"));
}

#[tokio::test]
async fn test_decide_noop_does_not_refresh() {
    let backend = MockBackend::start(Script::default()).await;
    let app = Application::new(backend.config(&["BTC", "ETH"])).unwrap();

    let response = app.controls().decide_and_execute().await.unwrap();
    assert!(!response.executed());
    assert_eq!(
        app.session().notifier().latest().unwrap().message,
        "AI decision: no action"
    );
    assert_eq!(backend.hits("/positions"), 0);
}

#[tokio::test]
async fn test_decide_execution_refreshes_trading_data() {
    let backend = MockBackend::start(Script {
        decide: (
            200,
            json!({
                "status": "executed",
                "decision": {"action": "buy", "symbol": "ETH", "notional_usd": 25.0},
                "execution": {"status": "filled", "side": "buy", "symbol": "ETH",
                              "notional_usd": 25.0, "avg_px": 3400.5}
            }),
        ),
        ..Script::default()
    })
    .await;
    let app = Application::new(backend.config(&["ETH"])).unwrap();

    let response = app.controls().decide_and_execute().await.unwrap();
    assert!(response.executed());
    let note = app.session().notifier().latest().unwrap();
    assert_eq!(note.level, NotificationLevel::Info);
    assert!(note.message.contains("3400.5"));
    assert_eq!(backend.hits("/positions"), 1);
}
