use busbar_shared::{BusbarError, BusbarResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// File names inside a workspace, matching what the generator produces.
pub const SERVER_FILE: &str = "server.py";
pub const MANIFEST_FILE: &str = "requirements.txt";

/// A disposable per-deployment directory holding the generated server source
/// and its dependency manifest. Created at deploy, removed on the owning
/// server's stop path; never shared between two deployments.
#[derive(Debug)]
pub struct ServerWorkspace {
    path: PathBuf,
}

impl ServerWorkspace {
    /// Create a fresh, uniquely named directory under `root` and write both
    /// payloads into it. The directory name carries the server id plus a
    /// random suffix so a redeploy never collides with the outgoing
    /// workspace of the same id.
    pub async fn provision(
        root: &Path,
        server_id: &str,
        source: &str,
        manifest: &str,
    ) -> BusbarResult<Self> {
        tokio::fs::create_dir_all(root)
            .await
            .map_err(|e| BusbarError::Workspace(format!("failed to create {}: {e}", root.display())))?;

        let suffix = Uuid::new_v4().simple().to_string();
        let path = root.join(format!("mcp_{server_id}_{suffix}"));
        // create_dir (not create_dir_all): a name collision is a hard error.
        tokio::fs::create_dir(&path)
            .await
            .map_err(|e| BusbarError::Workspace(format!("failed to create {}: {e}", path.display())))?;

        tokio::fs::write(path.join(SERVER_FILE), source)
            .await
            .map_err(|e| BusbarError::Workspace(format!("failed to write {SERVER_FILE}: {e}")))?;
        tokio::fs::write(path.join(MANIFEST_FILE), manifest)
            .await
            .map_err(|e| BusbarError::Workspace(format!("failed to write {MANIFEST_FILE}: {e}")))?;

        info!(server_id = %server_id, path = %path.display(), "Provisioned workspace");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entry_point(&self) -> PathBuf {
        self.path.join(SERVER_FILE)
    }

    pub fn manifest(&self) -> PathBuf {
        self.path.join(MANIFEST_FILE)
    }

    /// Recursively delete the workspace directory.
    pub async fn remove(self) -> BusbarResult<()> {
        debug!(path = %self.path.display(), "Removing workspace");
        tokio::fs::remove_dir_all(&self.path)
            .await
            .map_err(|e| BusbarError::Workspace(format!("failed to remove {}: {e}", self.path.display())))
    }
}
