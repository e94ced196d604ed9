//! Bucket mount reconciliation.

use crate::config::StorageCredentials;
use crate::error::{BootstrapError, Result};
use crate::infra::poll::{wait_until, PollConfig, PollOutcome};
use crate::infra::probe::HostProbe;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

/// Everything the mount utility needs for one mount.
#[derive(Clone)]
pub struct MountRequest {
    pub bucket: String,
    pub mount_path: PathBuf,
    pub endpoint: Url,
    access_key_id: String,
    secret_access_key: String,
}

impl MountRequest {
    pub fn new(credentials: &StorageCredentials, mount_path: &Path) -> Result<Self> {
        Ok(Self {
            bucket: credentials.bucket_name.clone(),
            mount_path: mount_path.to_path_buf(),
            endpoint: storage_endpoint(&credentials.account_id)?,
            access_key_id: credentials.access_key_id.clone(),
            secret_access_key: credentials.secret_access_key.clone(),
        })
    }

    /// Mount utility arguments. Credentials are passed through the child's
    /// environment, never on the command line.
    pub fn args(&self) -> Vec<String> {
        vec![
            self.bucket.clone(),
            self.mount_path.to_string_lossy().into_owned(),
            "-o".to_string(),
            format!("url={}", self.endpoint.as_str().trim_end_matches('/')),
            "-o".to_string(),
            "use_path_request_style".to_string(),
        ]
    }
}

impl std::fmt::Debug for MountRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountRequest")
            .field("bucket", &self.bucket)
            .field("mount_path", &self.mount_path)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

/// Build the S3-compatible endpoint for an account.
pub fn storage_endpoint(account_id: &str) -> Result<Url> {
    let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com");

    // Account ids are plain hostname labels; anything else could redirect
    // the mount (and its credentials) to another host.
    if account_id.is_empty()
        || !account_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(BootstrapError::InvalidEndpoint {
            endpoint,
            source: url::ParseError::InvalidDomainCharacter,
        });
    }

    Url::parse(&endpoint).map_err(|source| BootstrapError::InvalidEndpoint { endpoint, source })
}

/// Starts the external mount utility.
pub trait MountRunner: Send + Sync {
    /// Start the mount in the background. Returning `Ok` only means the
    /// utility was launched; readiness is observed through the mount table.
    fn spawn(&self, request: &MountRequest) -> Result<()>;
}

/// Runs `s3fs`.
#[derive(Debug, Clone)]
pub struct S3fsRunner {
    program: String,
}

impl S3fsRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MountRunner for S3fsRunner {
    fn spawn(&self, request: &MountRequest) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(request.args());
        cmd.env("AWSACCESSKEYID", &request.access_key_id);
        cmd.env("AWSSECRETACCESSKEY", &request.secret_access_key);
        cmd.stdin(Stdio::null());

        let mut child = cmd.spawn().map_err(|source| BootstrapError::MountSpawn {
            program: self.program.clone(),
            source,
        })?;

        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {}
                Ok(status) => warn!("Mount utility '{program}' exited with {status}"),
                Err(e) => warn!("Failed to wait on mount utility '{program}': {e}"),
            }
        });
        Ok(())
    }
}

/// Result of mount reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountStatus {
    /// The bucket is mounted. `newly_mounted` is false when it already was.
    Mounted { newly_mounted: bool },
    /// No storage credentials; local storage is ephemeral.
    Skipped,
    /// Mounting was attempted and failed; local storage is ephemeral.
    Degraded { reason: String },
}

impl MountStatus {
    pub fn is_mounted(&self) -> bool {
        matches!(self, Self::Mounted { .. })
    }
}

/// Make sure the bucket is mounted at `mount_path`.
///
/// Never fails: every problem downgrades to [`MountStatus::Skipped`] or
/// [`MountStatus::Degraded`] with a warning.
pub async fn reconcile_mount(
    credentials: Option<&StorageCredentials>,
    mount_path: &Path,
    probe: &dyn HostProbe,
    runner: &dyn MountRunner,
    poll: &PollConfig,
) -> MountStatus {
    let Some(credentials) = credentials else {
        warn!("Storage credentials not set, data will not persist across restarts");
        return MountStatus::Skipped;
    };

    if probe.is_mounted(mount_path) {
        info!("Bucket already mounted at {}", mount_path.display());
        return MountStatus::Mounted {
            newly_mounted: false,
        };
    }

    let request = match MountRequest::new(credentials, mount_path) {
        Ok(r) => r,
        Err(e) => return degraded(e.to_string()),
    };

    if let Err(e) = std::fs::create_dir_all(mount_path) {
        return degraded(BootstrapError::io(mount_path, e).to_string());
    }

    info!(
        bucket = %request.bucket,
        endpoint = %request.endpoint,
        "Mounting bucket at {}",
        mount_path.display()
    );
    if let Err(e) = runner.spawn(&request) {
        return degraded(e.to_string());
    }

    match wait_until(poll, || probe.is_mounted(mount_path)).await {
        PollOutcome::Ready { attempts, elapsed } => {
            info!(
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "Bucket mounted at {}",
                mount_path.display()
            );
            MountStatus::Mounted {
                newly_mounted: true,
            }
        }
        PollOutcome::TimedOut { attempts, elapsed } => degraded(format!(
            "mount did not appear after {attempts} checks ({}ms)",
            elapsed.as_millis()
        )),
    }
}

fn degraded(reason: String) -> MountStatus {
    warn!("Bucket mount failed ({reason}), continuing with local storage");
    MountStatus::Degraded { reason }
}
