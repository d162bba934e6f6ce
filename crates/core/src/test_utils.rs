use crate::config::AppConfig;
use crate::managers::{FlowStore, HostSettings, HostedServerManager, ServerCatalog};
use crate::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

/// Stub child program: reads one JSON-RPC request per line and echoes the
/// request id, the call arguments and its own pid.
pub const ECHO_SERVER_SOURCE: &str = r#"import json
import os
import sys

for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    request = json.loads(line)
    params = request.get("params") or {}
    response = {
        "jsonrpc": "2.0",
        "id": request.get("id"),
        "result": {
            "echo": params.get("arguments"),
            "pid": os.getpid(),
        },
    }
    sys.stdout.write(json.dumps(response) + "\n")
    sys.stdout.flush()
"#;

/// Stub child that reads requests but never answers them.
pub const SILENT_SERVER_SOURCE: &str = r#"import sys

for line in sys.stdin:
    pass
"#;

/// Stub child that answers every request with a non-JSON line.
pub const GARBAGE_SERVER_SOURCE: &str = r#"import sys

for line in sys.stdin:
    sys.stdout.write("this is not json\n")
    sys.stdout.flush()
"#;

/// Fresh workspace root under the system temp dir, unique per call.
pub fn test_workspace_root() -> PathBuf {
    std::env::temp_dir().join(format!("busbar_test_{}", Uuid::new_v4().simple()))
}

/// Supervisor settings for tests: a no-op installer, a short grace period
/// and a short call timeout.
pub fn test_host_settings(workspace_root: PathBuf) -> HostSettings {
    HostSettings {
        runtime: "python3".to_string(),
        installer: vec!["true".to_string()],
        workspace_root,
        stop_grace: Duration::from_secs(2),
        call_timeout: Duration::from_secs(5),
    }
}

pub fn create_test_app_state() -> Arc<AppState> {
    let config = AppConfig::load().unwrap();
    let host = Arc::new(HostedServerManager::new(test_host_settings(
        test_workspace_root(),
    )));

    Arc::new(AppState {
        flow: FlowStore::default(),
        catalog: ServerCatalog::default(),
        host,
        config,
        shutdown: Arc::new(Notify::new()),
    })
}
