use anyhow::Context;
use axum::http::HeaderValue;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::managers::HostSettings;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: String,
    pub cors_origins: Vec<HeaderValue>,
    /// Runtime used to execute generated servers (`BUSBAR_RUNTIME`).
    pub runtime: String,
    /// Installer command, whitespace-split; the manifest path is appended
    /// at launch. An empty value disables the install step.
    pub installer: Vec<String>,
    pub workspace_root: PathBuf,
    pub stop_grace_secs: u64,
    pub call_timeout_secs: u64,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let port_str = env::var("PORT").unwrap_or_else(|_| "8000".to_string());
        let port = port_str.parse::<u16>().map_err(|_| {
            anyhow::anyhow!(
                "Invalid PORT value '{}': must be an integer between 1 and 65535",
                port_str
            )
        })?;
        if port == 0 {
            anyhow::bail!("Invalid PORT value '0': must be between 1 and 65535");
        }

        // Defaults to loopback; set 0.0.0.0 explicitly for network access.
        let bind_address = match env::var("BIND_ADDRESS") {
            Ok(addr) => {
                addr.parse::<std::net::IpAddr>().with_context(|| {
                    format!("Invalid BIND_ADDRESS '{addr}': must be a valid IP address")
                })?;
                addr
            }
            Err(_) => "127.0.0.1".to_string(),
        };

        let cors_origins_str = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());
        let cors_origins: Vec<HeaderValue> = cors_origins_str
            .split(',')
            .filter_map(|s| {
                let trimmed = s.trim();
                if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
                    tracing::warn!(
                        "Skipping CORS origin with invalid scheme '{}': must be http:// or https://",
                        trimmed
                    );
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!("Skipping invalid CORS origin '{}': {}", trimmed, e);
                        None
                    }
                }
            })
            .collect();

        let runtime = env::var("BUSBAR_RUNTIME").unwrap_or_else(|_| "python3".to_string());

        let installer_str =
            env::var("BUSBAR_INSTALLER").unwrap_or_else(|_| "pip install -q -r".to_string());
        let installer: Vec<String> = installer_str
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let workspace_root = env::var("BUSBAR_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        let stop_grace_secs = env::var("BUSBAR_STOP_GRACE_SECS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .context("Failed to parse BUSBAR_STOP_GRACE_SECS")?;
        if stop_grace_secs == 0 || stop_grace_secs > 60 {
            anyhow::bail!(
                "BUSBAR_STOP_GRACE_SECS must be between 1 and 60 (got {})",
                stop_grace_secs
            );
        }

        let call_timeout_secs = env::var("BUSBAR_CALL_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<u64>()
            .context("Failed to parse BUSBAR_CALL_TIMEOUT_SECS")?;
        if call_timeout_secs == 0 || call_timeout_secs > 600 {
            anyhow::bail!(
                "BUSBAR_CALL_TIMEOUT_SECS must be between 1 and 600 (got {})",
                call_timeout_secs
            );
        }

        Ok(Self {
            port,
            bind_address,
            cors_origins,
            runtime,
            installer,
            workspace_root,
            stop_grace_secs,
            call_timeout_secs,
        })
    }

    /// Supervisor tunables derived from this configuration.
    #[must_use]
    pub fn host_settings(&self) -> HostSettings {
        HostSettings {
            runtime: self.runtime.clone(),
            installer: self.installer.clone(),
            workspace_root: self.workspace_root.clone(),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}
