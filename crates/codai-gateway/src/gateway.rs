//! Main Gateway implementation
//!
//! HTTP surface over the Codai services: a REST view of the memory store and
//! flag registry, plus `/rpc` for every typed operation.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use codai_core::flags::FlagContext;
use codai_core::memory::{MemoryEntry, MemoryPatch, MemoryQuery};
use codai_core::{EntityId, Services};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::{self, ApiRequest, ApiResponse};
use crate::config::GatewayConfig;
use crate::{GatewayError, Result};

/// Gateway state shared across handlers
#[derive(Debug, Clone)]
pub struct GatewayState {
    pub config: GatewayConfig,
    pub services: Services,
}

impl GatewayState {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let services = Services::from_config(&config.core)?;
        Ok(Self { config, services })
    }

    pub fn with_services(config: GatewayConfig, services: Services) -> Self {
        Self { config, services }
    }
}

/// Query string of `GET /api/flags/:name/evaluate`
#[derive(Debug, Default, Deserialize)]
pub struct EvaluateParams {
    pub user_id: Option<String>,
    pub service: Option<String>,
}

impl From<EvaluateParams> for FlagContext {
    fn from(params: EvaluateParams) -> Self {
        FlagContext {
            user_id: params.user_id,
            service: params.service,
        }
    }
}

/// Main Gateway server
#[derive(Debug)]
pub struct Gateway {
    state: Arc<GatewayState>,
}

impl Gateway {
    /// Create a new gateway, building services from the config
    pub fn new(config: GatewayConfig) -> Result<Self> {
        Ok(Self {
            state: Arc::new(GatewayState::new(config)?),
        })
    }

    /// Create a gateway over already constructed services
    pub fn with_services(config: GatewayConfig, services: Services) -> Self {
        Self {
            state: Arc::new(GatewayState::with_services(config, services)),
        }
    }

    /// Get gateway state
    pub fn state(&self) -> Arc<GatewayState> {
        self.state.clone()
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(Self::handle_health))
            .route("/status", get(Self::handle_status))
            .route("/rpc", post(Self::handle_rpc))
            .route(
                "/api/memories",
                post(Self::create_memory).get(Self::search_memories),
            )
            .route("/api/memories/stats", get(Self::memory_stats))
            .route(
                "/api/memories/:id",
                get(Self::get_memory)
                    .patch(Self::update_memory)
                    .delete(Self::delete_memory),
            )
            .route("/api/flags", get(Self::list_flags))
            .route("/api/flags/:name/evaluate", get(Self::evaluate_flag))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone());

        if self.state.config.cors {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Start the gateway server
    pub async fn start(&self) -> Result<()> {
        let addr = self.state.config.socket_addr()?;
        let router = self.build_router();

        tracing::info!("Codai gateway starting on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        tracing::info!("Codai gateway stopped");
        Ok(())
    }

    // HTTP handlers

    async fn handle_health() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "healthy",
            "version": crate::VERSION
        }))
    }

    async fn handle_status(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        let services = &state.services;
        Json(serde_json::json!({
            "version": crate::VERSION,
            "service": services.flags.service_name(),
            "memories": services.memory.len(),
            "mcpConnections": services.mcp.len(),
            "positions": services.positions.len(),
            "flags": services.flags.len(),
            "rolloutHash": services.flags.hash().to_string(),
        }))
    }

    async fn handle_rpc(
        State(state): State<Arc<GatewayState>>,
        request: std::result::Result<Json<ApiRequest>, JsonRejection>,
    ) -> Result<Json<ApiResponse>> {
        let Json(request) = request.map_err(bad_json)?;
        api::dispatch(&state.services, request).map(Json)
    }

    async fn create_memory(
        State(state): State<Arc<GatewayState>>,
        entry: std::result::Result<Json<MemoryEntry>, JsonRejection>,
    ) -> Result<impl IntoResponse> {
        let Json(entry) = entry.map_err(bad_json)?;
        let id = state.services.memory.create(entry)?;
        let record = state
            .services
            .memory
            .get(&id)
            .ok_or_else(|| GatewayError::Internal(format!("memory {id} vanished after create")))?;
        Ok((StatusCode::CREATED, Json(record)))
    }

    async fn search_memories(
        State(state): State<Arc<GatewayState>>,
        query: std::result::Result<Query<MemoryQuery>, QueryRejection>,
    ) -> Result<impl IntoResponse> {
        let Query(query) =
            query.map_err(|rejection| GatewayError::BadRequest(rejection.body_text()))?;
        Ok(Json(state.services.memory.search(&query)?))
    }

    async fn memory_stats(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(state.services.memory.stats())
    }

    async fn get_memory(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<EntityId>,
    ) -> Result<impl IntoResponse> {
        state
            .services
            .memory
            .get(&id)
            .map(Json)
            .ok_or_else(|| GatewayError::not_found("memory", id.as_str()))
    }

    async fn update_memory(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<EntityId>,
        patch: std::result::Result<Json<MemoryPatch>, JsonRejection>,
    ) -> Result<impl IntoResponse> {
        let Json(patch) = patch.map_err(bad_json)?;
        state
            .services
            .memory
            .update(&id, patch)?
            .map(Json)
            .ok_or_else(|| GatewayError::not_found("memory", id.as_str()))
    }

    async fn delete_memory(
        State(state): State<Arc<GatewayState>>,
        Path(id): Path<EntityId>,
    ) -> Result<StatusCode> {
        if state.services.memory.delete(&id) {
            Ok(StatusCode::NO_CONTENT)
        } else {
            Err(GatewayError::not_found("memory", id.as_str()))
        }
    }

    async fn list_flags(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
        Json(state.services.flags.list())
    }

    async fn evaluate_flag(
        State(state): State<Arc<GatewayState>>,
        Path(name): Path<String>,
        Query(params): Query<EvaluateParams>,
    ) -> impl IntoResponse {
        let context = FlagContext::from(params);
        Json(state.services.flags.evaluate(&name, &context))
    }
}

fn bad_json(rejection: JsonRejection) -> GatewayError {
    GatewayError::BadRequest(rejection.body_text())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Gateway shutdown initiated");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn gateway() -> Gateway {
        Gateway::with_services(GatewayConfig::default(), Services::empty().unwrap())
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_gateway_creation() {
        let config = GatewayConfig::default();
        let gateway = Gateway::new(config).unwrap();
        assert!(gateway.state().services.memory.len() > 0);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(gateway().build_router(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_memory_routes() {
        let gateway = gateway();

        let (status, created) = send(
            gateway.build_router(),
            json_request(
                "POST",
                "/api/memories",
                json!({ "title": "A", "content": "hello world", "type": "project", "tags": ["x"] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["relevance"], 0.5);

        let (status, found) = send(
            gateway.build_router(),
            get_request("/api/memories?query=hello&kind=project"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["totalFound"], 1);
        assert_eq!(found["items"][0]["id"], id.as_str());

        let (status, patched) = send(
            gateway.build_router(),
            json_request("PATCH", &format!("/api/memories/{id}"), json!({ "title": "B" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["title"], "B");

        let (status, stats) =
            send(gateway.build_router(), get_request("/api/memories/stats")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["total"], 1);

        let delete = Request::builder()
            .method("DELETE")
            .uri(format!("/api/memories/{id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(gateway.build_router(), delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) =
            send(gateway.build_router(), get_request(&format!("/api/memories/{id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_validation_is_bad_request() {
        let (status, body) = send(
            gateway().build_router(),
            json_request(
                "POST",
                "/api/memories",
                json!({ "title": "A", "content": "B", "type": "project", "relevance": 2.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");

        let (status, _) = send(
            gateway().build_router(),
            json_request("POST", "/rpc", json!({ "op": "explode" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_flag_routes() {
        let gateway = gateway();

        let (status, flags) = send(gateway.build_router(), get_request("/api/flags")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(flags
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f["name"] == "ai_chat"));

        let (status, eval) = send(
            gateway.build_router(),
            get_request("/api/flags/ai_chat/evaluate?user_id=u1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(eval["active"], true);

        let (_, eval) = send(
            gateway.build_router(),
            get_request("/api/flags/mcp_integration/evaluate?user_id=u1"),
        )
        .await;
        assert_eq!(eval["active"], false);
        assert_eq!(eval["reason"], "disabled");
    }

    #[tokio::test]
    async fn test_rpc_dispatch() {
        let (status, body) = send(
            gateway().build_router(),
            json_request("POST", "/rpc", json!({ "op": "list_flags" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "flags");
        assert!(body["data"].as_array().unwrap().len() >= 6);
    }
}
