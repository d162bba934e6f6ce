use axum::{
    extract::{Path, State},
    Json,
};
use busbar_shared::{BusbarError, FlowGraph, ServerConfig};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::info;

use crate::{generator, managers, AppError, AppResult, AppState};

/// Save (create or update) an MCP server configuration.
///
/// **Route:** `POST /api/mcp/server`
pub async fn create_server(
    State(state): State<Arc<AppState>>,
    Json(config): Json<ServerConfig>,
) -> AppResult<Json<serde_json::Value>> {
    if config.id.is_empty() {
        return Err(BusbarError::Validation("server id must not be empty".to_string()).into());
    }
    info!(server_id = %config.id, name = %config.name, "Saving server configuration");
    state.catalog.upsert(config.clone()).await;
    Ok(Json(
        serde_json::json!({ "message": "Server configuration saved", "server": config }),
    ))
}

/// List all saved server configurations.
///
/// **Route:** `GET /api/mcp/servers`
pub async fn list_servers(State(state): State<Arc<AppState>>) -> Json<Vec<ServerConfig>> {
    Json(state.catalog.list().await)
}

/// Get one saved server configuration.
///
/// **Route:** `GET /api/mcp/server/:id`
pub async fn get_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<ServerConfig>> {
    let config = state
        .catalog
        .get(&id)
        .await
        .ok_or(BusbarError::NotFound(id))?;
    Ok(Json(config))
}

/// Delete a saved server configuration.
///
/// **Route:** `DELETE /api/mcp/server/:id`
pub async fn delete_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.catalog.remove(&id).await {
        return Err(BusbarError::NotFound(id).into());
    }
    Ok(Json(serde_json::json!({ "message": "Server deleted", "server_id": id })))
}

/// Convert a flow graph into a server configuration and save it.
///
/// **Route:** `POST /api/mcp/flow-to-server`
pub async fn flow_to_server(
    State(state): State<Arc<AppState>>,
    Json(graph): Json<FlowGraph>,
) -> AppResult<Json<ServerConfig>> {
    let config = managers::flow_to_config(&graph)?;
    info!(
        server_id = %config.id,
        tools = config.tools.len(),
        resources = config.resources.len(),
        prompts = config.prompts.len(),
        "Converted flow to server configuration"
    );
    state.catalog.upsert(config.clone()).await;
    Ok(Json(config))
}

/// Generate the server source and dependency manifest for a configuration.
///
/// **Route:** `POST /api/mcp/generate/:id`
pub async fn generate_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let config = state
        .catalog
        .get(&id)
        .await
        .ok_or(BusbarError::NotFound(id))?;
    Ok(Json(serde_json::json!({
        "server_id": config.id,
        "code": generator::generate_server(&config),
        "requirements": generator::generate_requirements(),
    })))
}

/// Export a generated server as a downloadable zip archive
/// (server.py, requirements.txt, README.md).
///
/// **Route:** `POST /api/mcp/export/:id`
pub async fn export_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<impl axum::response::IntoResponse> {
    let config = state
        .catalog
        .get(&id)
        .await
        .ok_or(BusbarError::NotFound(id))?;
    let bytes = build_export_zip(&config).map_err(AppError::Internal)?;
    let filename = format!("{}-mcp-server.zip", config.name.to_lowercase().replace(' ', "-"));
    Ok((
        [
            (
                axum::http::header::CONTENT_TYPE,
                "application/zip".to_string(),
            ),
            (
                axum::http::header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    ))
}

fn build_export_zip(config: &ServerConfig) -> anyhow::Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        zip.start_file("server.py", options)?;
        zip.write_all(generator::generate_server(config).as_bytes())?;

        zip.start_file("requirements.txt", options)?;
        zip.write_all(generator::generate_requirements().as_bytes())?;

        zip.start_file("README.md", options)?;
        zip.write_all(generator::generate_readme(config).as_bytes())?;

        zip.finish()?;
    }
    Ok(cursor.into_inner())
}
