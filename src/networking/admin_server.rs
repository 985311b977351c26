//! Admin HTTP Server
//! Core Principle: Thin glue over PolicyEngine, no policy logic lives here

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::RegistryError;
use crate::policy::{PolicyEngine, PolicyRule, UpdateReport};

/// Server state shared across all handlers
#[derive(Clone)]
pub struct ServerState {
    engine: Arc<PolicyEngine>,
}

/// Standardized error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

/// Standardized API response
#[derive(Debug, Serialize)]
pub struct StandardApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> StandardApiResponse<T> {
    fn success(data: T) -> Self {
        StandardApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn partial(data: T, error: ErrorResponse) -> Self {
        StandardApiResponse {
            success: false,
            data: Some(data),
            error: Some(error),
        }
    }
}

/// Query parameters for set-rule
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRuleQuery {
    pub agent_id: String,
    #[serde(default)]
    pub agent_url: Option<String>,
    pub path: String,
}

/// Query parameters for clear-rule
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRuleQuery {
    pub agent_id: String,
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    pub path: String,
}

/// Agent registration request
#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterAgentRequest {
    pub agent_id: String,
    pub agent_url: String,
}

/// Serve `app` on an already bound listener
pub async fn serve<F>(listener: tokio::net::TcpListener, app: Router, shutdown: F) -> Result<(), RegistryError>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            log::info!("🛑 Received shutdown signal, stopping admin API...");
        })
        .await?;
    Ok(())
}

/// Build the admin router
pub fn router(engine: Arc<PolicyEngine>) -> Router {
    Router::new()
        .route("/api/admin/policy/set-rule", post(set_rule))
        .route("/api/admin/policy/clear-rule", post(clear_rule))
        .route("/api/admin/policy/:agent_id", get(get_policies))
        .route("/api/admin/policy/:agent_id/resolve", get(resolve_path))
        .route("/api/admin/agents", get(list_agents))
        .route("/api/admin/agents/register", post(register_agent))
        .route("/api/admin/agents/:agent_id", delete(remove_agent))
        .route("/api/admin/ping", get(ping))
        .with_state(Arc::new(ServerState { engine }))
}

/// Storage succeeded; status depends on whether the agent took the update
fn update_response(report: UpdateReport) -> Response {
    match report.propagation_result() {
        Ok(()) => (StatusCode::OK, Json(StandardApiResponse::success(report))).into_response(),
        Err(e) => {
            let error = ErrorResponse {
                code: e.code().to_string(),
                message: format!("policy stored but not propagated: {}", e),
            };
            (StatusCode::BAD_GATEWAY, Json(StandardApiResponse::partial(report, error))).into_response()
        }
    }
}

/// POST /api/admin/policy/set-rule?agentId=..&agentUrl=..&path=..
async fn set_rule(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<SetRuleQuery>,
    Json(rule): Json<PolicyRule>,
) -> Result<Response, RegistryError> {
    log::debug!("POST /api/admin/policy/set-rule agent={} path={}", query.agent_id, query.path);

    if let Some(agent_url) = query.agent_url.as_deref() {
        state.engine.register_agent(&query.agent_id, agent_url)?;
    }
    let report = state.engine.set_rule(&query.agent_id, &query.path, rule).await?;
    Ok(update_response(report))
}

/// POST /api/admin/policy/clear-rule?agentId=..&path=..
async fn clear_rule(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ClearRuleQuery>,
) -> Result<Response, RegistryError> {
    log::debug!("POST /api/admin/policy/clear-rule agent={} path={}", query.agent_id, query.path);

    let report = state.engine.clear_rule(&query.agent_id, &query.path).await?;
    Ok(update_response(report))
}

/// GET /api/admin/policy/:agent_id
async fn get_policies(
    State(state): State<Arc<ServerState>>,
    Path(agent_id): Path<String>,
) -> impl IntoResponse {
    let snapshot = state.engine.snapshot(&agent_id);
    let response = serde_json::json!({
        "agent_id": agent_id,
        "generation": snapshot.generation(),
        "rules": snapshot.rules(),
    });
    (StatusCode::OK, Json(StandardApiResponse::success(response)))
}

/// GET /api/admin/policy/:agent_id/resolve?path=..
async fn resolve_path(
    State(state): State<Arc<ServerState>>,
    Path(agent_id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> impl IntoResponse {
    let resolution = state.engine.resolve(&agent_id, &query.path);
    (StatusCode::OK, Json(StandardApiResponse::success(resolution)))
}

/// GET /api/admin/agents
async fn list_agents(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let agents = state.engine.store().list_sync_status();
    (StatusCode::OK, Json(StandardApiResponse::success(agents)))
}

/// POST /api/admin/agents/register
async fn register_agent(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<RegisterAgentRequest>,
) -> Result<Response, RegistryError> {
    state.engine.register_agent(&request.agent_id, &request.agent_url)?;
    Ok((StatusCode::OK, Json(StandardApiResponse::success(request))).into_response())
}

/// DELETE /api/admin/agents/:agent_id
async fn remove_agent(
    State(state): State<Arc<ServerState>>,
    Path(agent_id): Path<String>,
) -> Result<Response, RegistryError> {
    let report = state.engine.remove_agent(&agent_id).await?;
    if !report.changed {
        let error = ErrorResponse {
            code: "AGENT_NOT_FOUND".to_string(),
            message: format!("Agent {} not found", agent_id),
        };
        let body: StandardApiResponse<()> = StandardApiResponse {
            success: false,
            data: None,
            error: Some(error),
        };
        return Ok((StatusCode::NOT_FOUND, Json(body)).into_response());
    }
    Ok(update_response(report))
}

/// GET /api/admin/ping
async fn ping() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(StandardApiResponse::success(response)))
}
