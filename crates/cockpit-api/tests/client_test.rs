//! Request layer tests against a local axum server.

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use cockpit_api::{ApiConfig, ApiError, CockpitClient, OrderRequest, OrderSide};
use serde_json::{json, Value};
use std::collections::HashMap;

async fn serve(router: Router) -> CockpitClient {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    CockpitClient::new(&ApiConfig {
        base_url: format!("http://{addr}/"),
        request_timeout_ms: Some(2_000),
    })
    .unwrap()
}

fn order(symbol: &str) -> OrderRequest {
    OrderRequest {
        symbol: symbol.to_string(),
        side: OrderSide::Buy,
        notional_usd: 25.0,
        reduce_only: false,
    }
}

#[tokio::test]
async fn test_order_success_returns_ack() {
    let router = Router::new().route(
        "/order/limit_ioc",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["side"], "buy");
            assert_eq!(body["reduce_only"], false);
            Json(json!({"status": "success", "order_id": "abc", "avg_px": 1800.5}))
        }),
    );
    let client = serve(router).await;

    let ack = client.place_order(&order("ETH")).await.unwrap();
    assert_eq!(ack.order_id, "abc");
    assert_eq!(ack.avg_px, 1800.5);
}

#[tokio::test]
async fn test_order_rejection_carries_detail_error() {
    let router = Router::new().route(
        "/order/limit_ioc",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": {"error": "insufficient_margin"}})),
            )
        }),
    );
    let client = serve(router).await;

    let err = client.place_order(&order("ETH")).await.unwrap_err();
    assert_eq!(
        err,
        ApiError::Rejected {
            status: 400,
            message: "insufficient_margin".to_string()
        }
    );
}

#[tokio::test]
async fn test_query_parameters_sent() {
    let router = Router::new()
        .route(
            "/trades",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                assert_eq!(q.get("limit").map(String::as_str), Some("50"));
                Json(json!([
                    {"side": "short", "coin": "SOL", "entry": 192.6, "exit": 190.2, "qty": 10,
                     "close_reason": "tp", "pnl": 24.0}
                ]))
            }),
        )
        .route(
            "/positions",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let coin = q.get("symbol").cloned().unwrap_or_default();
                Json(json!([{"side": "long", "coin": coin, "entry": 39.21, "qty": 100}]))
            }),
        );
    let client = serve(router).await;

    let trades = client.trades(50).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].close_reason, "tp");

    let positions = client.positions(Some("HYPE")).await.unwrap();
    assert_eq!(positions[0].coin, "HYPE");
}

#[tokio::test]
async fn test_status_and_market_snapshot() {
    let router = Router::new()
        .route(
            "/status",
            get(|| async {
                Json(json!({"market": "ok", "api": "healthy", "db": "stale", "ws": "connected",
                            "bot": "mock", "_meta": {"source": "mock"}}))
            }),
        )
        .route(
            "/market/snapshot",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let symbol = q.get("symbols").cloned().unwrap_or_default();
                if symbol == "SOL" {
                    return Json(json!({"error": "stale_data", "stale_symbols": ["SOL"]}));
                }
                Json(json!({"micro": {"spread_bps": 1.0, "obi": 0.4}, "meta": {"insufficient": false}}))
            }),
        );
    let client = serve(router).await;

    let status = client.status().await.unwrap();
    assert_eq!(status.len(), 5);
    assert_eq!(status["db"], "stale");

    assert!(!client.market_snapshot("BTC").await.unwrap().is_insufficient());
    assert!(client.market_snapshot("SOL").await.unwrap().is_insufficient());
}

#[tokio::test]
async fn test_decide_and_execute_sends_intent_id() {
    let router = Router::new().route(
        "/decide_and_execute",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert!(headers.get("X-Intent-ID").is_some());
            assert_eq!(body["symbols"], json!(["BTC", "ETH"]));
            Json(json!({"status": "noop"}))
        }),
    );
    let client = serve(router).await;

    let resp = client
        .decide_and_execute(&["BTC".to_string(), "ETH".to_string()])
        .await
        .unwrap();
    assert_eq!(resp.summary(), "AI decision: no action");
}

#[tokio::test]
async fn test_kill_switch_roundtrip_and_decode_error() {
    let router = Router::new()
        .route(
            "/kill_switch",
            get(|| async { Json(json!({"enabled": true})) })
                .post(|Json(body): Json<Value>| async move { Json(body) }),
        )
        .route("/metrics", get(|| async { "not json" }));
    let client = serve(router).await;

    assert!(client.kill_switch().await.unwrap().enabled);
    assert!(!client.set_kill_switch(false).await.unwrap().enabled);
    assert!(matches!(client.metrics().await, Err(ApiError::Decode(_))));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let client = CockpitClient::new(&ApiConfig {
        base_url: format!("http://{addr}"),
        request_timeout_ms: Some(500),
    })
    .unwrap();

    assert!(matches!(
        client.prices().await,
        Err(ApiError::Transport(_))
    ));
}
