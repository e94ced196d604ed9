//! Startup pipeline.
//!
//! Runs the stages in order: running-gateway guard, bucket mount, directory
//! redirection, config sync, lock cleanup. The result is either an early
//! exit or the gateway invocation to hand off to.

use crate::config::{
    sync_config, BootstrapSettings, ConfigOrigin, ConfigSync, EnvSnapshot, MergeSummary,
};
use crate::infra::probe::HostProbe;
use crate::launcher::{remove_stale_locks, GatewayInvocation};
use crate::storage::{
    reconcile_mount, redirect_into_mount, MountRunner, MountStatus, Redirect, RedirectOutcome,
};
use tracing::{debug, error, info, warn};

/// State of the config file after the sync stage.
#[derive(Debug, Clone)]
pub enum ConfigState {
    Synced {
        origin: ConfigOrigin,
        hash_before: String,
        hash_after: String,
        merge: MergeSummary,
    },
    /// The file could not be created or written. The gateway starts with
    /// whatever is on disk.
    Failed { reason: String },
}

impl From<ConfigSync> for ConfigState {
    fn from(sync: ConfigSync) -> Self {
        Self::Synced {
            origin: sync.origin,
            hash_before: sync.hash_before,
            hash_after: sync.hash_after,
            merge: sync.summary,
        }
    }
}

/// What the bootstrap did before handing off.
#[derive(Debug, Clone)]
pub struct StartupReport {
    pub mount: MountStatus,
    pub config_redirect: RedirectOutcome,
    pub skills_redirect: RedirectOutcome,
    pub config: ConfigState,
}

impl StartupReport {
    pub fn config_origin(&self) -> Option<ConfigOrigin> {
        match &self.config {
            ConfigState::Synced { origin, .. } => Some(*origin),
            ConfigState::Failed { .. } => None,
        }
    }

    pub fn merge(&self) -> Option<&MergeSummary> {
        match &self.config {
            ConfigState::Synced { merge, .. } => Some(merge),
            ConfigState::Failed { .. } => None,
        }
    }

    pub fn config_changed(&self) -> bool {
        match &self.config {
            ConfigState::Synced {
                hash_before,
                hash_after,
                ..
            } => hash_before != hash_after,
            ConfigState::Failed { .. } => false,
        }
    }

    /// State written by the gateway survives a restart only when the bucket
    /// is mounted and both directories point into it.
    pub fn is_persistent(&self) -> bool {
        let linked = |o: &RedirectOutcome| {
            matches!(o, RedirectOutcome::AlreadyLinked | RedirectOutcome::Linked { .. })
        };
        self.mount.is_mounted() && linked(&self.config_redirect) && linked(&self.skills_redirect)
    }

    fn log(&self) {
        info!(
            mount = ?self.mount,
            config_dir = ?self.config_redirect,
            skills_dir = ?self.skills_redirect,
            config_origin = ?self.config_origin(),
            config_changed = self.config_changed(),
            "Bootstrap complete"
        );

        if let ConfigState::Failed { reason } = &self.config {
            error!(%reason, "Config was not synchronized, gateway starts with the file as is");
        }

        if !self.is_persistent() {
            let reason = match &self.mount {
                MountStatus::Skipped => "storage credentials not configured".to_string(),
                MountStatus::Degraded { reason } => reason.clone(),
                MountStatus::Mounted { .. } => "directory redirection failed".to_string(),
            };
            warn!(
                persistence = "ephemeral",
                %reason,
                "Gateway state will be lost when the container restarts"
            );
        }
    }
}

/// How the bootstrap ended.
#[derive(Debug)]
pub enum BootstrapOutcome {
    /// A gateway is already running; nothing was touched.
    AlreadyRunning,
    /// Everything is in place; exec `invocation` next.
    Ready {
        report: StartupReport,
        invocation: GatewayInvocation,
    },
}

/// Bring the container to a launchable state.
///
/// Never fails. Mount, redirection and config problems are recorded in the
/// report and startup continues; only the exec that follows can be fatal.
pub async fn prepare(
    settings: &BootstrapSettings,
    env: &EnvSnapshot,
    probe: &dyn HostProbe,
    runner: &dyn MountRunner,
) -> BootstrapOutcome {
    if probe.gateway_running() {
        info!("Gateway is already running, nothing to do");
        return BootstrapOutcome::AlreadyRunning;
    }

    let paths = &settings.paths;
    let credentials = env.storage_credentials();
    let mount = reconcile_mount(
        credentials.as_ref(),
        &paths.mount_path,
        probe,
        runner,
        &settings.mount_poll,
    )
    .await;

    let (config_redirect, skills_redirect) = if mount.is_mounted() {
        let config = Redirect {
            local: paths.config_dir.clone(),
            target: paths.mount_config_dir(),
        };
        let skills = Redirect {
            local: paths.skills_dir.clone(),
            target: paths.mount_skills_dir(),
        };
        (
            redirect_into_mount(&config, probe),
            redirect_into_mount(&skills, probe),
        )
    } else {
        debug!("Bucket not mounted, keeping local directories");
        (RedirectOutcome::Skipped, RedirectOutcome::Skipped)
    };

    let config = match sync_config(paths, env, true) {
        Ok(sync) => ConfigState::from(sync),
        Err(e) => ConfigState::Failed {
            reason: e.to_string(),
        },
    };

    remove_stale_locks(&paths.lock_files);

    if env.dev_mode() {
        debug!("Dev mode enables insecure control UI auth; bind mode is unchanged");
    }
    let invocation = GatewayInvocation::new(&settings.gateway_bin, env.gateway_token());

    let report = StartupReport {
        mount,
        config_redirect,
        skills_redirect,
        config,
    };
    report.log();

    BootstrapOutcome::Ready { report, invocation }
}
