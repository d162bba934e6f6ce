pub mod flow;
pub mod hosted;
pub mod servers;

use axum::Json;

/// Root endpoint: service banner plus the main endpoint groups.
///
/// **Route:** `GET /`
pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Welcome to the Busbar API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/api/nodes", "/api/edges", "/api/flow", "/api/mcp"]
    }))
}

/// Health check endpoint.
///
/// **Route:** `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}
