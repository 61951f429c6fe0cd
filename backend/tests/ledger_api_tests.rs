//! Ledger API tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use stock_ledger_backend::{create_app, AppState, Config};
use tower::ServiceExt;

// ============================================================================
// Helpers
// ============================================================================

fn app() -> Router {
    create_app(AppState::new(Config::default()))
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn dec(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

fn mill_records() -> Value {
    json!({
        "movements": [
            {"id": "p1", "date": "2024-06-01", "movementType": "purchase", "status": "approved", "variety": "Sona", "productCategory": "Rice", "bags": 100, "bagSizeKg": 26, "toLocation": "A1"},
            {"id": "s1", "date": "2024-06-02", "movementType": "sale", "status": "approved", "variety": "Sona", "productCategory": "Rice", "bags": 40, "bagSizeKg": 26, "fromLocation": "A1"},
            {"id": "s2", "date": "2024-06-03", "movementType": "sale", "status": "pending", "variety": "Sona", "productCategory": "Rice", "bags": 10, "bagSizeKg": 26, "fromLocation": "A1"},
            {"id": "x1", "date": "2024-06-03", "movementType": "palti", "status": "approved", "variety": "Sona", "productCategory": "Rice", "fromLocation": "A1", "toLocation": "Direct Load", "bags": 10, "bagSizeKg": 25, "sourceBagSizeKg": 26, "shortageKg": 6}
        ]
    })
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_status_counts_cached_reports() {
    let app = app();
    let (status, _) = post(app.clone(), "/api/v1/ledger/replay", json!({"input": mill_records()})).await;
    assert_eq!(status, StatusCode::OK);

    let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["environment"], "development");
    assert_eq!(body["cached_reports"], 1);
}

// ============================================================================
// Replay
// ============================================================================

#[tokio::test]
async fn test_replay_returns_day_ledgers() {
    let (status, body) = post(app(), "/api/v1/ledger/replay", json!({"input": mill_records()})).await;
    assert_eq!(status, StatusCode::OK);

    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!(days[0]["date"], "2024-06-01");
    assert_eq!(days[1]["opening"], days[0]["closing"]);
    assert_eq!(days[2]["pending"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_replay_bounded_range() {
    let body = json!({"input": mill_records(), "start": "2024-06-02", "end": "2024-06-02"});
    let (status, body) = post(app(), "/api/v1/ledger/replay", body).await;
    assert_eq!(status, StatusCode::OK);

    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["date"], "2024-06-02");
    assert!(!days[0]["opening"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_replay_rejects_inverted_range() {
    let body = json!({"input": mill_records(), "start": "2024-06-09", "end": "2024-06-01"});
    let (status, body) = post(app(), "/api/v1/ledger/replay", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_replay_rejects_malformed_envelope() {
    let (status, body) = post(app(), "/api/v1/ledger/replay", json!({"input": {"movements": 7}})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_replay_rejects_range_over_limit() {
    let body = json!({"input": mill_records(), "start": "0001-01-01", "end": "9999-12-31"});
    let (status, body) = post(app(), "/api/v1/ledger/replay", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "end");
}

#[tokio::test]
async fn test_replay_on_seed_rows() {
    let body = json!({
        "input": mill_records(),
        "seed": [{"variety": "Sona", "productCategory": "Rice", "location": "A1", "bags": 60, "bagSizeKg": 26}],
        "start": "2024-06-03",
    });
    let (status, body) = post(app(), "/api/v1/ledger/replay", body).await;
    assert_eq!(status, StatusCode::OK);

    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["opening"].as_object().unwrap().len(), 1);
}

// ============================================================================
// Rollups
// ============================================================================

#[tokio::test]
async fn test_aggregate_by_category_skips_direct_load() {
    let (status, body) = post(
        app(),
        "/api/v1/ledger/aggregate?dimension=product_category",
        json!({"input": mill_records()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2024-06-03");

    // 60 bags left after the sale, 2.56 quintals drawn by the palti
    let rice = &body["totals"]["rice"];
    assert_eq!(dec(&rice["quintals"]), Decimal::from_str("13.04").unwrap());
}

#[tokio::test]
async fn test_aggregate_by_location() {
    let (status, body) = post(
        app(),
        "/api/v1/ledger/aggregate?dimension=location",
        json!({"input": mill_records()}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["totals"]["direct load"]["bags"]), Decimal::from(10));
}

#[tokio::test]
async fn test_aggregate_rejects_unknown_dimension() {
    let (status, body) = post(
        app(),
        "/api/v1/ledger/aggregate?dimension=colour",
        json!({"input": mill_records()}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["field"], "dimension");
}

#[tokio::test]
async fn test_summary_reports_palti_shortage() {
    let (status, body) = post(app(), "/api/v1/ledger/summary", json!({"input": mill_records()})).await;
    assert_eq!(status, StatusCode::OK);
    let days = body["days"].as_array().unwrap();
    assert_eq!(days[2]["palti_count"], 1);
    assert_eq!(dec(&days[2]["palti_shortage_kg"]), Decimal::from(6));
    assert_eq!(dec(&days[1]["outward"]["rice"]["bags"]), Decimal::from(40));
}

#[tokio::test]
async fn test_opening_balance() {
    let body = json!({"input": mill_records(), "as_of": "2024-06-03"});
    let (status, body) = post(app(), "/api/v1/ledger/opening-balance", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dec(&body["total"]["bags"]), Decimal::from(60));
    assert_eq!(body["buckets"].as_object().unwrap().len(), 1);
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    #[test]
    fn replay_never_fails_on_arbitrary_records(
        bags in prop::collection::vec(prop_oneof![
            Just(json!(null)),
            Just(json!("ten")),
            (0i64..500).prop_map(|n| json!(n)),
            (-50i64..0).prop_map(|n| json!(n)),
        ], 0..12),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let movements: Vec<Value> = bags
            .into_iter()
            .enumerate()
            .map(|(i, bags)| {
                let kind = ["purchase", "sale", "shift", "palti", "bogus"][i % 5];
                json!({
                    "id": i,
                    "date": format!("2024-06-{:02}", i % 5 + 1),
                    "type": kind,
                    "status": "approved",
                    "bags": bags,
                    "location": "A1",
                    "toLocation": "A2",
                })
            })
            .collect();
        let (status, _) = runtime.block_on(post(
            app(),
            "/api/v1/ledger/replay",
            json!({"input": {"movements": movements}}),
        ));
        prop_assert_eq!(status, StatusCode::OK);
    }
}
