//! End-to-end checks of the HTTP surface with seeded services

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use codai_core::{CodaiConfig, Services};
use codai_gateway::{Gateway, GatewayConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router_for(core: CodaiConfig) -> Router {
    let config = GatewayConfig::default().with_core(core);
    Gateway::new(config).unwrap().build_router()
}

async fn rpc(router: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/rpc")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn status_reports_seeded_counts() {
    let router = router_for(CodaiConfig::default());
    let request = Request::builder().uri("/status").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["service"], "codai");
    assert_eq!(body["memories"], 4);
    assert_eq!(body["mcpConnections"], 3);
    assert_eq!(body["positions"], 4);
}

#[tokio::test]
async fn position_lifecycle_over_rpc() {
    let gateway = Gateway::with_services(GatewayConfig::default(), Services::empty().unwrap());

    let (status, created) = rpc(
        gateway.build_router(),
        json!({
            "op": "open_position",
            "position": {
                "wallet": "0xabc",
                "protocol": "aave",
                "asset": "USDC",
                "kind": "lending",
                "amount": 1000.0,
                "valueUsd": 1000.0,
                "apy": 4.0
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["type"], "created");
    let id = created["data"]["id"].as_str().unwrap().to_string();

    let (_, portfolio) = rpc(
        gateway.build_router(),
        json!({ "op": "portfolio", "wallet": "0xabc" }),
    )
    .await;
    assert_eq!(portfolio["type"], "portfolio");
    assert_eq!(portfolio["data"]["positions"], 1);
    assert_eq!(portfolio["data"]["totalValueUsd"], 1000.0);

    let (status, updated) = rpc(
        gateway.build_router(),
        json!({ "op": "update_position", "id": id, "patch": { "apy": 20000.0 } }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(updated["error"], "validation_error");

    let (status, _) = rpc(
        gateway.build_router(),
        json!({ "op": "close_position", "id": id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, missing) = rpc(
        gateway.build_router(),
        json!({ "op": "get_position", "id": id }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(missing["error"], "not_found");
}

#[tokio::test]
async fn mcp_query_by_status() {
    let router = router_for(CodaiConfig::default());
    let (status, body) = rpc(
        router,
        json!({ "op": "query_mcp", "query": { "kind": "connected" } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "mcp_connections");
    for item in body["data"]["items"].as_array().unwrap() {
        assert_eq!(item["status"], "connected");
    }
}

#[tokio::test]
async fn service_scope_follows_configuration() {
    let wallet = router_for(
        CodaiConfig::default()
            .with_fixtures(false)
            .with_service_name("wallet"),
    );
    let (_, eval) = rpc(
        wallet,
        json!({ "op": "evaluate_flag", "name": "defi_positions", "context": { "userId": "u1" } }),
    )
    .await;
    assert_eq!(eval["data"]["active"], true);

    let dashboard = router_for(
        CodaiConfig::default()
            .with_fixtures(false)
            .with_service_name("dashboard"),
    );
    let (_, eval) = rpc(
        dashboard,
        json!({ "op": "evaluate_flag", "name": "defi_positions", "context": { "userId": "u1" } }),
    )
    .await;
    assert_eq!(eval["data"]["active"], false);
    assert_eq!(eval["data"]["reason"], "out_of_scope");
}

#[tokio::test]
async fn rollout_is_stable_across_requests() {
    let gateway = Gateway::with_services(GatewayConfig::default(), Services::empty().unwrap());
    let request = json!({
        "op": "evaluate_flag",
        "name": "realtime_analytics",
        "context": { "userId": "user-17" }
    });

    let (_, first) = rpc(gateway.build_router(), request.clone()).await;
    let (_, second) = rpc(gateway.build_router(), request).await;
    assert_eq!(first, second);
    assert!(first["data"]["bucket"].as_u64().unwrap() < 100);
}

#[tokio::test]
async fn blank_service_param_uses_registry_service() {
    let router = router_for(
        CodaiConfig::default()
            .with_fixtures(false)
            .with_service_name("wallet"),
    );
    let request = Request::builder()
        .uri("/api/flags/defi_positions/evaluate?user_id=u1&service=")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let eval: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(eval["active"], true);
    assert_eq!(eval["reason"], "full_rollout");
}

#[tokio::test]
async fn oversized_limit_returns_a_page() {
    let router = router_for(CodaiConfig::default());
    let (status, body) = rpc(
        router,
        json!({ "op": "search_memories", "query": { "kind": "project", "limit": 500 } }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "memories");
    let items = body["data"]["items"].as_array().unwrap();
    assert_eq!(items.len() as u64, body["data"]["totalFound"].as_u64().unwrap());
    for item in items {
        assert_eq!(item["type"], "project");
    }
}
