use busbar_shared::{
    BusbarError, BusbarResult, FlowEdge, FlowGraph, FlowNode, PromptSpec, ResourceSpec,
    ServerConfig, ToolSpec,
};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::warn;

/// In-memory store for the editor canvas. The original backend keeps the
/// whole flow in one process-global dict; here it is an explicit aggregate
/// behind a read/write lock owned by the app state.
#[derive(Default)]
pub struct FlowStore {
    inner: RwLock<FlowGraph>,
}

impl FlowStore {
    pub async fn nodes(&self) -> Vec<FlowNode> {
        self.inner.read().await.nodes.clone()
    }

    pub async fn add_node(&self, node: FlowNode) {
        self.inner.write().await.nodes.push(node);
    }

    pub async fn edges(&self) -> Vec<FlowEdge> {
        self.inner.read().await.edges.clone()
    }

    pub async fn add_edge(&self, edge: FlowEdge) {
        self.inner.write().await.edges.push(edge);
    }

    pub async fn graph(&self) -> FlowGraph {
        self.inner.read().await.clone()
    }

    pub async fn replace(&self, graph: FlowGraph) {
        *self.inner.write().await = graph;
    }

    pub async fn clear(&self) {
        *self.inner.write().await = FlowGraph::default();
    }
}

/// Saved MCP server configurations, keyed by id.
#[derive(Default)]
pub struct ServerCatalog {
    inner: RwLock<HashMap<String, ServerConfig>>,
}

impl ServerCatalog {
    pub async fn upsert(&self, config: ServerConfig) {
        self.inner.write().await.insert(config.id.clone(), config);
    }

    pub async fn get(&self, id: &str) -> Option<ServerConfig> {
        self.inner.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<ServerConfig> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.inner.write().await.remove(id).is_some()
    }
}

// ============================================================
// Flow graph → server configuration conversion
// ============================================================

fn data_label(node: &FlowNode) -> Option<&str> {
    node.data.get("label").and_then(Value::as_str)
}

fn config_str<'a>(node: &'a FlowNode, field: &str) -> Option<&'a str> {
    node.data
        .get("config")
        .and_then(|c| c.get(field))
        .and_then(Value::as_str)
}

fn config_value(node: &FlowNode, field: &str) -> Option<Value> {
    node.data
        .get("config")
        .and_then(|c| c.get(field))
        .cloned()
}

/// Build a `ServerConfig` from the canvas: the `mcp-server` node supplies
/// identity, and tool/resource/prompt nodes joined to it by an edge
/// contribute the corresponding specs. Nodes missing their essential fields
/// are skipped with a warning rather than failing the whole conversion.
pub fn flow_to_config(graph: &FlowGraph) -> BusbarResult<ServerConfig> {
    let server_node = graph
        .nodes
        .iter()
        .find(|n| n.node_type == "mcp-server")
        .ok_or_else(|| {
            BusbarError::Validation("flow contains no mcp-server node".to_string())
        })?;

    let name = config_str(server_node, "name")
        .or_else(|| data_label(server_node))
        .unwrap_or("Untitled Server")
        .to_string();

    let mut config = ServerConfig {
        id: server_node.id.clone(),
        name,
        description: config_str(server_node, "description")
            .unwrap_or_default()
            .to_string(),
        version: config_str(server_node, "version").unwrap_or("1.0.0").to_string(),
        ..ServerConfig::default()
    };

    let connected: Vec<&str> = graph
        .edges
        .iter()
        .filter_map(|e| {
            if e.source == server_node.id {
                Some(e.target.as_str())
            } else if e.target == server_node.id {
                Some(e.source.as_str())
            } else {
                None
            }
        })
        .collect();

    for node in graph.nodes.iter().filter(|n| connected.contains(&n.id.as_str())) {
        match node.node_type.as_str() {
            "mcp-tool" => {
                let Some(name) = config_str(node, "name").or_else(|| data_label(node)) else {
                    warn!(node_id = %node.id, "Skipping tool node without a name");
                    continue;
                };
                config.tools.push(ToolSpec {
                    id: node.id.clone(),
                    name: name.to_string(),
                    description: config_str(node, "description").unwrap_or_default().to_string(),
                    input_schema: config_value(node, "input_schema").unwrap_or(Value::Null),
                    implementation: config_str(node, "implementation").map(str::to_string),
                });
            }
            "mcp-resource" => {
                let Some(uri) = config_str(node, "uri") else {
                    warn!(node_id = %node.id, "Skipping resource node without a uri");
                    continue;
                };
                config.resources.push(ResourceSpec {
                    id: node.id.clone(),
                    uri: uri.to_string(),
                    name: config_str(node, "name")
                        .or_else(|| data_label(node))
                        .unwrap_or_default()
                        .to_string(),
                    description: config_str(node, "description").unwrap_or_default().to_string(),
                    mime_type: config_str(node, "mime_type").unwrap_or("text/plain").to_string(),
                });
            }
            "mcp-prompt" => {
                let Some(template) = config_str(node, "template") else {
                    warn!(node_id = %node.id, "Skipping prompt node without a template");
                    continue;
                };
                let arguments = config_value(node, "arguments")
                    .map(|v| serde_json::from_value(v).unwrap_or_default())
                    .unwrap_or_default();
                config.prompts.push(PromptSpec {
                    id: node.id.clone(),
                    name: config_str(node, "name")
                        .or_else(|| data_label(node))
                        .unwrap_or_default()
                        .to_string(),
                    description: config_str(node, "description").unwrap_or_default().to_string(),
                    arguments,
                    template: template.to_string(),
                });
            }
            other => {
                warn!(node_id = %node.id, node_type = %other, "Ignoring unknown node type");
            }
        }
    }

    Ok(config)
}
