use busbar_shared::{BusbarError, BusbarResult, ServerConfig};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::protocol::{CallToolParams, JsonRpcRequest};
use super::transport::{self, StdioTransport};
use super::workspace::ServerWorkspace;

// ============================================================
// HostSettings — supervisor tunables, sourced from AppConfig
// ============================================================

#[derive(Debug, Clone)]
pub struct HostSettings {
    /// Runtime used to execute generated servers (whitelisted in transport).
    pub runtime: String,
    /// Dependency installer command; the manifest path is appended. Empty
    /// disables the install step.
    pub installer: Vec<String>,
    /// Parent directory for per-deployment workspaces.
    pub workspace_root: PathBuf,
    /// Grace period between the termination request and the forced kill.
    pub stop_grace: Duration,
    /// Bounded wait for one request/response exchange.
    pub call_timeout: Duration,
}

// ============================================================
// RpcClient — line-delimited JSON-RPC against one child process
// ============================================================

pub struct RpcClient {
    /// The transport Mutex doubles as the single-request-in-flight gate:
    /// the framing is strictly one line out per one line in, so the
    /// send/receive pair must hold the lock for the whole exchange or a
    /// later request could be paired with an earlier request's response.
    transport: Mutex<StdioTransport>,
    next_id: AtomicI64,
    call_timeout: Duration,
}

impl RpcClient {
    fn new(transport: StdioTransport, call_timeout: Duration) -> Self {
        Self {
            transport: Mutex::new(transport),
            next_id: AtomicI64::new(1),
            call_timeout,
        }
    }

    /// Perform one request/response exchange. The response line is parsed as
    /// JSON and returned verbatim; no envelope shape is enforced.
    pub async fn call(&self, method: &str, params: Option<Value>) -> BusbarResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let line = serde_json::to_string(&request)
            .map_err(|e| BusbarError::Internal(format!("failed to encode request: {e}")))?;

        let mut transport = self.transport.lock().await;
        let discarded = transport.drain_stale();
        if discarded > 0 {
            debug!(discarded, "Dropped stale response lines before sending");
        }
        transport.send(line).await?;

        let response = match tokio::time::timeout(self.call_timeout, transport.recv()).await {
            Ok(Some(line)) => line,
            Ok(None) => {
                return Err(BusbarError::Protocol(
                    "child closed its output stream".to_string(),
                ))
            }
            Err(_) => {
                return Err(BusbarError::Timeout(format!(
                    "no response within {:?}",
                    self.call_timeout
                )))
            }
        };

        serde_json::from_str(&response)
            .map_err(|e| BusbarError::Protocol(format!("response line is not valid JSON: {e}")))
    }
}

// ============================================================
// HostedServer — one deployment: workspace + process + status
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Stopped,
    Starting,
    Running,
    Error,
}

/// Live process half of a deployment: the OS child plus the JSON-RPC client
/// bound to its pipes. Present if and only if the server reached Running.
struct ServerProcess {
    child: Child,
    client: Arc<RpcClient>,
    deployed_at: DateTime<Utc>,
}

struct ServerState {
    status: ServerStatus,
    config: ServerConfig,
    workspace: Option<ServerWorkspace>,
    process: Option<ServerProcess>,
}

/// Status snapshot reported upward. `running` is a fresh liveness probe of
/// the OS process and may disagree with the cached `status` transiently
/// (e.g. a crashed child that has not been stopped yet).
#[derive(Debug, Clone, serde::Serialize)]
pub struct HostedServerStatus {
    pub id: String,
    pub status: ServerStatus,
    pub name: String,
    pub running: bool,
}

pub struct HostedServer {
    id: String,
    settings: HostSettings,
    /// Serializes lifecycle transitions for this id; per-id work never
    /// blocks operations on other ids.
    state: Mutex<ServerState>,
}

impl HostedServer {
    fn new(id: String, settings: HostSettings) -> Self {
        Self {
            id,
            settings,
            state: Mutex::new(ServerState {
                status: ServerStatus::Stopped,
                config: ServerConfig::default(),
                workspace: None,
                process: None,
            }),
        }
    }

    /// Deploy the generated payloads, superseding any existing deployment
    /// under this id. On failure the server is downgraded to Error and the
    /// workspace is kept on disk for diagnosis; the next stop or redeploy
    /// reclaims it.
    pub async fn deploy(
        &self,
        config: ServerConfig,
        source: &str,
        manifest: &str,
    ) -> BusbarResult<()> {
        let mut state = self.state.lock().await;

        if state.process.is_some() || state.workspace.is_some() {
            info!(server_id = %self.id, "Redeploy supersedes the existing deployment");
            let process = state.process.take();
            let workspace = state.workspace.take();
            state.status = ServerStatus::Stopped;
            teardown_detached(self.id.clone(), process, workspace, self.settings.stop_grace)
                .await?;
        }

        state.status = ServerStatus::Starting;
        state.config = config;

        match self.launch(&mut state, source, manifest).await {
            Ok(()) => {
                state.status = ServerStatus::Running;
                info!(server_id = %self.id, "Hosted server started successfully");
                Ok(())
            }
            Err(e) => {
                state.status = ServerStatus::Error;
                if let Some(ws) = &state.workspace {
                    warn!(
                        server_id = %self.id,
                        path = %ws.path().display(),
                        "Deploy failed; workspace kept on disk for diagnosis"
                    );
                }
                error!(server_id = %self.id, error = %e, "Failed to start hosted server");
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        state: &mut ServerState,
        source: &str,
        manifest: &str,
    ) -> BusbarResult<()> {
        let workspace = ServerWorkspace::provision(
            &self.settings.workspace_root,
            &self.id,
            source,
            manifest,
        )
        .await?;
        let manifest_path = workspace.manifest();
        let entry = workspace.entry_point();
        let workspace_path = workspace.path().to_path_buf();
        state.workspace = Some(workspace);

        transport::run_installer(&self.settings.installer, &manifest_path, &workspace_path)
            .await?;

        let (child, stdio) =
            transport::spawn_server(&self.id, &self.settings.runtime, &entry, &workspace_path)
                .await?;
        state.process = Some(ServerProcess {
            child,
            client: Arc::new(RpcClient::new(stdio, self.settings.call_timeout)),
            deployed_at: Utc::now(),
        });
        Ok(())
    }

    /// Stop the deployment: graceful termination with a bounded grace
    /// period, then forced kill, then workspace removal. Returns Ok(false)
    /// when there was nothing to stop. Idempotent.
    pub async fn stop(&self) -> BusbarResult<bool> {
        let (process, workspace) = {
            let mut state = self.state.lock().await;
            if state.process.is_none() && state.workspace.is_none() {
                debug!(server_id = %self.id, "Stop is a no-op, server not running");
                return Ok(false);
            }
            state.status = ServerStatus::Stopped;
            (state.process.take(), state.workspace.take())
        };
        teardown_detached(self.id.clone(), process, workspace, self.settings.stop_grace).await?;
        Ok(true)
    }

    /// Unconditional stop followed by deploy with the new payloads; the
    /// outcome is the outcome of the deploy step.
    pub async fn restart(
        &self,
        config: ServerConfig,
        source: &str,
        manifest: &str,
    ) -> BusbarResult<()> {
        if let Err(e) = self.stop().await {
            warn!(server_id = %self.id, error = %e, "Stop before restart failed");
        }
        self.deploy(config, source, manifest).await
    }

    /// One `tools/call` exchange against the child. Fails fast with
    /// NotRunning unless the server is Running. A protocol failure does not
    /// change the server's status; liveness is probed independently.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> BusbarResult<Value> {
        let client = {
            let state = self.state.lock().await;
            if state.status != ServerStatus::Running {
                return Err(BusbarError::NotRunning(self.id.clone()));
            }
            match &state.process {
                Some(process) => process.client.clone(),
                None => return Err(BusbarError::NotRunning(self.id.clone())),
            }
        };
        // State lock released here: a slow exchange must not block status
        // probes or lifecycle operations on this id.
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };
        let params = serde_json::to_value(params)
            .map_err(|e| BusbarError::Internal(format!("failed to encode params: {e}")))?;
        client.call("tools/call", Some(params)).await
    }

    pub async fn status(&self) -> HostedServerStatus {
        let mut state = self.state.lock().await;
        let running = state
            .process
            .as_mut()
            .is_some_and(|p| transport::probe_alive(&mut p.child));
        HostedServerStatus {
            id: self.id.clone(),
            status: state.status,
            name: state.config.name.clone(),
            running,
        }
    }
}

/// Run process termination and workspace removal on a detached task and wait
/// for it, so cleanup completes even if the caller is cancelled mid-await.
async fn teardown_detached(
    id: String,
    process: Option<ServerProcess>,
    workspace: Option<ServerWorkspace>,
    grace: Duration,
) -> BusbarResult<()> {
    let handle = tokio::spawn(run_teardown(id, process, workspace, grace));
    handle
        .await
        .map_err(|e| BusbarError::Internal(format!("teardown task failed: {e}")))
}

async fn run_teardown(
    id: String,
    process: Option<ServerProcess>,
    workspace: Option<ServerWorkspace>,
    grace: Duration,
) {
    if let Some(mut process) = process {
        let uptime = Utc::now() - process.deployed_at;
        let forced = transport::terminate_child(&id, &mut process.child, grace).await;
        if forced {
            info!(
                server_id = %id,
                uptime_secs = uptime.num_seconds(),
                "Hosted server killed after grace period"
            );
        } else {
            info!(
                server_id = %id,
                uptime_secs = uptime.num_seconds(),
                "Hosted server stopped gracefully"
            );
        }
    }
    if let Some(workspace) = workspace {
        if let Err(e) = workspace.remove().await {
            warn!(server_id = %id, error = %e, "Failed to remove workspace");
        }
    }
}

// ============================================================
// HostedServerManager — registry of deployments keyed by id
// ============================================================

pub struct HostedServerManager {
    servers: RwLock<HashMap<String, Arc<HostedServer>>>,
    settings: HostSettings,
}

impl HostedServerManager {
    #[must_use]
    pub fn new(settings: HostSettings) -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            settings,
        }
    }

    /// Deploy under `id`, creating the entry if absent or superseding the
    /// existing deployment. The entry stays registered on failure so the
    /// Error status remains observable until the caller stops it.
    pub async fn deploy(
        &self,
        id: &str,
        config: ServerConfig,
        source: &str,
        manifest: &str,
    ) -> BusbarResult<()> {
        let server = self.entry(id).await;
        // Table lock released: per-id lifecycle work proceeds independently.
        server.deploy(config, source, manifest).await
    }

    /// Stop and deregister `id`. Errors with NotFound for unknown ids,
    /// distinct from the Ok(false) "was not running" outcome.
    pub async fn stop(&self, id: &str) -> BusbarResult<bool> {
        let server = {
            let mut servers = self.servers.write().await;
            servers.remove(id)
        }
        .ok_or_else(|| BusbarError::NotFound(id.to_string()))?;
        server.stop().await
    }

    /// Restart under `id`; behaves as a plain deploy when the id is unknown.
    pub async fn restart(
        &self,
        id: &str,
        config: ServerConfig,
        source: &str,
        manifest: &str,
    ) -> BusbarResult<()> {
        let server = self.entry(id).await;
        server.restart(config, source, manifest).await
    }

    pub async fn get(&self, id: &str) -> Option<Arc<HostedServer>> {
        self.servers.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<HostedServerStatus> {
        let servers: Vec<Arc<HostedServer>> =
            self.servers.read().await.values().cloned().collect();
        futures::future::join_all(servers.iter().map(|s| s.status())).await
    }

    /// Stop every registered server. Called once at process shutdown so no
    /// child process or workspace outlives the supervisor.
    pub async fn cleanup_all(&self) {
        let drained: Vec<(String, Arc<HostedServer>)> = {
            let mut servers = self.servers.write().await;
            servers.drain().collect()
        };
        let count = drained.len();
        let results =
            futures::future::join_all(drained.iter().map(|(_, server)| server.stop())).await;
        for ((id, _), result) in drained.iter().zip(results) {
            if let Err(e) = result {
                warn!(server_id = %id, error = %e, "Cleanup stop failed");
            }
        }
        info!(count, "All hosted servers stopped");
    }

    async fn entry(&self, id: &str) -> Arc<HostedServer> {
        let mut servers = self.servers.write().await;
        servers
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(HostedServer::new(id.to_string(), self.settings.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(ServerStatus::Running).unwrap(),
            serde_json::json!("running")
        );
        assert_eq!(
            serde_json::to_value(ServerStatus::Error).unwrap(),
            serde_json::json!("error")
        );
    }

    #[test]
    fn status_snapshot_shape() {
        let snapshot = HostedServerStatus {
            id: "srv1".to_string(),
            status: ServerStatus::Stopped,
            name: "Weather".to_string(),
            running: false,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["id"], "srv1");
        assert_eq!(value["status"], "stopped");
        assert_eq!(value["name"], "Weather");
        assert_eq!(value["running"], false);
    }
}
