//! Shared types for the Busbar platform: the error taxonomy used across the
//! supervisor and HTTP layers, plus the flow-graph and MCP server
//! configuration models exchanged with the editor frontend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Platform-wide error taxonomy.
///
/// `Workspace`, `Spawn`, `NotFound`, `NotRunning`, `Protocol` and `Timeout`
/// are the supervisor's failure modes; `Validation` and `Internal` belong to
/// the HTTP boundary.
#[derive(Debug, thiserror::Error, Serialize, Deserialize)]
pub enum BusbarError {
    #[error("Workspace error: {0}")]
    Workspace(String),
    #[error("Spawn error: {0}")]
    Spawn(String),
    #[error("Server not found: {0}")]
    NotFound(String),
    #[error("Server not running: {0}")]
    NotRunning(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Timeout occurred: {0}")]
    Timeout(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BusbarResult<T> = std::result::Result<T, BusbarError>;

// ============================================================
// MCP server configuration model (editor → generator → host)
// ============================================================

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_mime_type() -> String {
    "text/plain".to_string()
}

fn default_true() -> bool {
    true
}

/// A tool exposed by a composed MCP server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    /// User-supplied Python body for the tool handler; a not-implemented
    /// stub is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation: Option<String>,
}

/// A resource exposed by a composed MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSpec {
    pub id: String,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
}

/// A named argument of a prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

/// A prompt exposed by a composed MCP server. `template` may reference
/// arguments as `{{name}}`; substitution happens inside the generated server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
    pub template: String,
}

/// Complete configuration of one composed MCP server. The supervisor keeps
/// this as an opaque snapshot for status reporting; only the generator
/// interprets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub resources: Vec<ResourceSpec>,
    #[serde(default)]
    pub prompts: Vec<PromptSpec>,
}

// ============================================================
// Flow graph model (editor canvas)
// ============================================================

/// One node on the editor canvas. `node_type` distinguishes
/// `mcp-server` / `mcp-tool` / `mcp-resource` / `mcp-prompt`; `data` carries
/// the node's label and per-type configuration, uninterpreted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub position: Value,
    #[serde(default)]
    pub data: Value,
}

/// A directed edge between two canvas nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEdge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// The whole canvas: every node and edge the editor has placed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
}
