use axum::{
    extract::{Path, State},
    Json,
};
use busbar_shared::BusbarError;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use crate::managers::HostedServerStatus;
use crate::{generator, AppResult, AppState};

fn default_arguments() -> Value {
    serde_json::json!({})
}

#[derive(Debug, Deserialize)]
pub struct CallToolRequest {
    pub name: String,
    #[serde(default = "default_arguments")]
    pub arguments: Value,
}

/// Generate the saved configuration's payloads and deploy them as a managed
/// child process. Deploying over an already-hosted id supersedes it.
///
/// **Route:** `POST /api/mcp/deploy/:id`
///
/// # Response
/// - **200 OK:** `{ "status": "deployed", "server_id": id }`
/// - **404 Not Found:** no saved configuration under `id`
/// - **500 Internal Server Error:** provisioning, install or spawn failed;
///   the server stays registered with status `error`
pub async fn deploy_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let config = state
        .catalog
        .get(&id)
        .await
        .ok_or_else(|| BusbarError::NotFound(id.clone()))?;
    info!(server_id = %id, "Deploying server");

    let code = generator::generate_server(&config);
    let requirements = generator::generate_requirements();
    state.host.deploy(&id, config, &code, &requirements).await?;

    Ok(Json(serde_json::json!({ "status": "deployed", "server_id": id })))
}

/// Stop a hosted server and remove it from the registry.
///
/// **Route:** `DELETE /api/mcp/deploy/:id`
///
/// # Response
/// - **200 OK:** `{ "status": "stopped", "was_running": bool }` —
///   `was_running` distinguishes a real teardown from a no-op stop
/// - **404 Not Found:** `id` is not hosted
pub async fn stop_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let was_running = state.host.stop(&id).await?;
    Ok(Json(serde_json::json!({
        "status": "stopped",
        "server_id": id,
        "was_running": was_running
    })))
}

/// Restart a hosted server with freshly generated payloads.
///
/// **Route:** `POST /api/mcp/deploy/:id/restart`
pub async fn restart_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let config = state
        .catalog
        .get(&id)
        .await
        .ok_or_else(|| BusbarError::NotFound(id.clone()))?;
    info!(server_id = %id, "Restarting server");

    let code = generator::generate_server(&config);
    let requirements = generator::generate_requirements();
    state
        .host
        .restart(&id, config, &code, &requirements)
        .await?;

    Ok(Json(serde_json::json!({ "status": "restarted", "server_id": id })))
}

/// List all hosted servers with their status snapshots.
///
/// **Route:** `GET /api/mcp/hosted`
pub async fn list_hosted(State(state): State<Arc<AppState>>) -> Json<Vec<HostedServerStatus>> {
    Json(state.host.list().await)
}

/// Status snapshot of one hosted server. `running` is a fresh liveness probe
/// and may disagree with the cached `status` (e.g. a crashed child).
///
/// **Route:** `GET /api/mcp/hosted/:id/status`
pub async fn hosted_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<HostedServerStatus>> {
    let server = state
        .host
        .get(&id)
        .await
        .ok_or(BusbarError::NotFound(id))?;
    Ok(Json(server.status().await))
}

/// Call a tool on a hosted server. The child's JSON response is returned
/// verbatim.
///
/// **Route:** `POST /api/mcp/:id/tools/call`
///
/// # Response
/// - **200 OK:** the child's response line, parsed as JSON
/// - **404 Not Found:** `id` is not hosted
/// - **409 Conflict:** the server is not in the running state
/// - **502 Bad Gateway / 504 Gateway Timeout:** malformed or missing response
pub async fn call_tool(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<CallToolRequest>,
) -> AppResult<Json<Value>> {
    let server = state
        .host
        .get(&id)
        .await
        .ok_or(BusbarError::NotFound(id))?;
    let response = server.call_tool(&request.name, request.arguments).await?;
    Ok(Json(response))
}
