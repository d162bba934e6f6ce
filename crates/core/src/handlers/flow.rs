use axum::{extract::State, Json};
use busbar_shared::{FlowEdge, FlowGraph, FlowNode};
use std::sync::Arc;
use tracing::info;

use crate::AppState;

/// List all canvas nodes.
///
/// **Route:** `GET /api/nodes`
pub async fn get_nodes(State(state): State<Arc<AppState>>) -> Json<Vec<FlowNode>> {
    Json(state.flow.nodes().await)
}

/// Add a node to the canvas.
///
/// **Route:** `POST /api/nodes`
pub async fn create_node(
    State(state): State<Arc<AppState>>,
    Json(node): Json<FlowNode>,
) -> Json<serde_json::Value> {
    state.flow.add_node(node.clone()).await;
    Json(serde_json::json!({ "message": "Node created", "node": node }))
}

/// List all canvas edges.
///
/// **Route:** `GET /api/edges`
pub async fn get_edges(State(state): State<Arc<AppState>>) -> Json<Vec<FlowEdge>> {
    Json(state.flow.edges().await)
}

/// Add an edge to the canvas.
///
/// **Route:** `POST /api/edges`
pub async fn create_edge(
    State(state): State<Arc<AppState>>,
    Json(edge): Json<FlowEdge>,
) -> Json<serde_json::Value> {
    state.flow.add_edge(edge.clone()).await;
    Json(serde_json::json!({ "message": "Edge created", "edge": edge }))
}

/// Get the entire flow (nodes and edges).
///
/// **Route:** `GET /api/flow`
pub async fn get_flow(State(state): State<Arc<AppState>>) -> Json<FlowGraph> {
    Json(state.flow.graph().await)
}

/// Replace the entire flow.
///
/// **Route:** `POST /api/flow`
pub async fn save_flow(
    State(state): State<Arc<AppState>>,
    Json(graph): Json<FlowGraph>,
) -> Json<serde_json::Value> {
    info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "Saving flow"
    );
    state.flow.replace(graph).await;
    let saved = state.flow.graph().await;
    Json(serde_json::json!({ "message": "Flow saved successfully", "flow": saved }))
}

/// Clear all nodes and edges.
///
/// **Route:** `DELETE /api/flow`
pub async fn clear_flow(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.flow.clear().await;
    Json(serde_json::json!({ "message": "Flow cleared" }))
}
