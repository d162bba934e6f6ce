use busbar_shared::{BusbarError, BusbarResult};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Allowed runtimes for hosted server execution (security whitelist)
const ALLOWED_RUNTIMES: &[&str] = &["python", "python3", "node", "deno", "bun"];

/// Validate the runtime against the whitelist (bare command names only, no paths)
pub fn validate_runtime(runtime: &str) -> BusbarResult<String> {
    if runtime.contains('/') || runtime.contains('\\') {
        return Err(BusbarError::Spawn(format!(
            "runtime must not contain path separators: '{runtime}'"
        )));
    }
    if !ALLOWED_RUNTIMES.contains(&runtime) {
        return Err(BusbarError::Spawn(format!(
            "runtime '{runtime}' not in whitelist {ALLOWED_RUNTIMES:?}"
        )));
    }
    Ok(runtime.to_string())
}

/// Run the dependency installer to completion against the manifest file.
/// An empty installer command disables the step. A non-zero exit status
/// fails the launch, carrying the tail of the installer's stderr.
pub async fn run_installer(
    installer: &[String],
    manifest: &Path,
    workspace: &Path,
) -> BusbarResult<()> {
    let Some((program, args)) = installer.split_first() else {
        debug!("No installer configured, skipping dependency install");
        return Ok(());
    };

    info!(installer = %program, manifest = %manifest.display(), "Installing dependencies");
    let output = Command::new(program)
        .args(args)
        .arg(manifest)
        .current_dir(workspace)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| BusbarError::Spawn(format!("failed to run installer '{program}': {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(5)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(BusbarError::Spawn(format!(
            "dependency install failed with {}: {tail}",
            output.status
        )));
    }
    Ok(())
}

/// The write/read halves of a child's piped stdio, pumped by background
/// tasks. One request line in `send` pairs with one response line in `recv`;
/// the pairing discipline itself lives in `RpcClient`.
pub struct StdioTransport {
    request_tx: mpsc::Sender<String>,
    response_rx: mpsc::Receiver<String>,
}

/// Spawn the generated server with piped stdio, rooted at the workspace.
/// Returns the process handle alongside the transport so the owner can probe
/// liveness and terminate independently of any in-flight exchange.
pub async fn spawn_server(
    server_id: &str,
    runtime: &str,
    entry: &Path,
    workspace: &Path,
) -> BusbarResult<(Child, StdioTransport)> {
    let runtime = validate_runtime(runtime)?;
    info!(server_id = %server_id, runtime = %runtime, entry = %entry.display(), "Starting hosted server");

    let mut cmd = Command::new(runtime);
    cmd.arg(entry)
        .current_dir(workspace)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| BusbarError::Spawn(format!("failed to spawn hosted server: {e}")))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| BusbarError::Spawn("failed to open child stdin".to_string()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BusbarError::Spawn("failed to open child stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| BusbarError::Spawn("failed to open child stderr".to_string()))?;

    let (req_tx, mut req_rx) = mpsc::channel::<String>(100);
    let (res_tx, res_rx) = mpsc::channel::<String>(100);

    // Writer task
    let writer_id = server_id.to_string();
    tokio::spawn(async move {
        let mut writer = stdin;
        while let Some(msg) = req_rx.recv().await {
            let line = format!("{msg}\n");
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                error!(server_id = %writer_id, "Failed to write to child stdin: {}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                error!(server_id = %writer_id, "Failed to flush child stdin: {}", e);
                break;
            }
        }
    });

    // Reader task (stdout)
    let reader_id = server_id.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if !line.trim().is_empty() && res_tx.send(line).await.is_err() {
                break;
            }
        }
        debug!(server_id = %reader_id, "Hosted server stdout closed");
    });

    // Logger task (stderr)
    let stderr_id = server_id.to_string();
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            warn!("[hosted:{}] {}", stderr_id, line);
        }
    });

    Ok((
        child,
        StdioTransport {
            request_tx: req_tx,
            response_rx: res_rx,
        },
    ))
}

impl StdioTransport {
    pub async fn send(&self, msg: String) -> BusbarResult<()> {
        self.request_tx
            .send(msg)
            .await
            .map_err(|_| BusbarError::Protocol("child stdin is closed".to_string()))
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.response_rx.recv().await
    }

    /// Discard any buffered response lines left behind by an exchange whose
    /// caller gave up (e.g. a timed-out call), so the next request cannot be
    /// paired with an earlier request's response.
    pub fn drain_stale(&mut self) -> usize {
        let mut discarded = 0;
        while let Ok(line) = self.response_rx.try_recv() {
            debug!(line = %line, "Discarding stale response line");
            discarded += 1;
        }
        discarded
    }
}

/// Request graceful termination, wait up to `grace`, then kill. Returns
/// whether the forced path was taken. Both paths end with the process reaped.
pub async fn terminate_child(server_id: &str, child: &mut Child, grace: Duration) -> bool {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain kill(2) on a pid we own; failure (e.g. already
            // exited) is handled by the wait below.
            unsafe {
                libc::kill(pid as i32, libc::SIGTERM);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(_) => false,
        Err(_) => {
            warn!(server_id = %server_id, "Graceful stop timed out after {:?}, killing", grace);
            if let Err(e) = child.kill().await {
                error!(server_id = %server_id, "Failed to kill hosted server: {}", e);
            }
            true
        }
    }
}

/// Non-blocking liveness probe: has the child exited?
pub fn probe_alive(child: &mut Child) -> bool {
    matches!(child.try_wait(), Ok(None))
}
