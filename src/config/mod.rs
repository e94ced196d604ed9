mod defaults;
mod env;
mod io;
mod merge;
mod synth;
mod types;

pub use defaults::*;
pub use env::*;
pub use io::*;
pub use merge::*;
pub use synth::*;
pub use types::*;

use crate::error::Result;
use crate::infra::poll::PollConfig;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

/// Filesystem layout the bootstrap operates on.
///
/// `Default` is the fixed container layout; tests point it at a temp dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub template_file: PathBuf,
    pub mount_path: PathBuf,
    pub skills_dir: PathBuf,
    pub lock_files: Vec<PathBuf>,
}

impl Default for BootstrapPaths {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(CONFIG_DIR),
            config_file: PathBuf::from(CONFIG_FILE),
            template_file: PathBuf::from(TEMPLATE_FILE),
            mount_path: PathBuf::from(MOUNT_PATH),
            skills_dir: PathBuf::from(SKILLS_DIR),
            lock_files: LOCK_FILES.iter().map(PathBuf::from).collect(),
        }
    }
}

impl BootstrapPaths {
    /// Same layout re-rooted under `root` (`/root/.mylobster` becomes
    /// `<root>/root/.mylobster`).
    pub fn rooted_at(root: &std::path::Path) -> Self {
        let reroot = |p: &PathBuf| root.join(p.strip_prefix("/").unwrap_or(p));
        let base = Self::default();
        Self {
            config_dir: reroot(&base.config_dir),
            config_file: reroot(&base.config_file),
            template_file: reroot(&base.template_file),
            mount_path: reroot(&base.mount_path),
            skills_dir: reroot(&base.skills_dir),
            lock_files: base.lock_files.iter().map(reroot).collect(),
        }
    }

    /// Where the config directory lives inside the mount.
    pub fn mount_config_dir(&self) -> PathBuf {
        self.mount_path.join(MOUNT_CONFIG_SUBDIR)
    }

    /// Where the skills directory lives inside the mount.
    pub fn mount_skills_dir(&self) -> PathBuf {
        self.mount_path.join(MOUNT_SKILLS_SUBDIR)
    }
}

/// Runtime settings for one bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub paths: BootstrapPaths,
    /// Gateway executable, resolved through `PATH` when not absolute.
    pub gateway_bin: String,
    /// Mount readiness backoff.
    pub mount_poll: PollConfig,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            paths: BootstrapPaths::default(),
            gateway_bin: DEFAULT_GATEWAY_BIN.to_string(),
            mount_poll: PollConfig::default(),
        }
    }
}

/// Outcome of synchronizing the config file with the environment.
#[derive(Debug, Clone)]
pub struct ConfigSync {
    pub origin: ConfigOrigin,
    pub summary: MergeSummary,
    pub hash_before: String,
    pub hash_after: String,
    pub document: Map<String, Value>,
}

impl ConfigSync {
    pub fn changed(&self) -> bool {
        self.hash_before != self.hash_after
    }
}

/// Ensure the config exists, merge the environment into it, and write it
/// back. With `write = false` the merged document is computed but the
/// file is left as the synthesizer produced it.
pub fn sync_config(paths: &BootstrapPaths, env: &EnvSnapshot, write: bool) -> Result<ConfigSync> {
    let origin = ensure_config_file(&paths.config_file, &paths.template_file)?;

    let mut document = read_config_lenient(&paths.config_file);
    let hash_before = resolve_config_snapshot_hash(&document);
    let summary = merge_env_into_config(&mut document, env);
    let hash_after = resolve_config_snapshot_hash(&document);

    if write {
        write_config_atomic(&paths.config_file, &document)?;
    }

    info!(
        origin = ?origin,
        changed = hash_before != hash_after,
        hash = %hash_after,
        channels = ?summary.channels_applied,
        "Config synchronized"
    );

    Ok(ConfigSync {
        origin,
        summary,
        hash_before,
        hash_after,
        document,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn rooted_paths_keep_layout() {
        let paths = BootstrapPaths::rooted_at(std::path::Path::new("/tmp/x"));
        assert_eq!(paths.config_file, PathBuf::from("/tmp/x/root/.mylobster/mylobster.json"));
        assert_eq!(paths.mount_config_dir(), PathBuf::from("/tmp/x/data/mylobster/mylobster"));
        assert_eq!(paths.mount_skills_dir(), PathBuf::from("/tmp/x/data/mylobster/skills"));
        assert_eq!(paths.lock_files[0], PathBuf::from("/tmp/x/tmp/mylobster-gateway.lock"));
    }

    #[test]
    fn sync_from_nothing_writes_pinned_default() {
        let dir = TempDir::new().unwrap();
        let paths = BootstrapPaths::rooted_at(dir.path());

        let sync = sync_config(&paths, &EnvSnapshot::default(), true).unwrap();
        assert_eq!(sync.origin, ConfigOrigin::Default);

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.config_file).unwrap()).unwrap();
        assert_eq!(
            written,
            serde_json::json!({
                "agents": {"defaults": {
                    "workspace": "/root/mylobster",
                    "model": {"primary": DEFAULT_MODEL}
                }},
                "gateway": {"port": 18789, "mode": "local", "trustedProxies": ["10.1.0.0"]},
                "channels": {}
            })
        );
    }

    #[test]
    fn dry_sync_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let paths = BootstrapPaths::rooted_at(dir.path());
        std::fs::create_dir_all(&paths.config_dir).unwrap();
        std::fs::write(&paths.config_file, "{\"custom\": 1}").unwrap();

        let sync = sync_config(&paths, &EnvSnapshot::default(), false).unwrap();
        assert!(sync.changed());
        assert_eq!(sync.document["custom"], 1);
        assert_eq!(std::fs::read_to_string(&paths.config_file).unwrap(), "{\"custom\": 1}");
    }

    #[test]
    fn second_sync_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let paths = BootstrapPaths::rooted_at(dir.path());
        let env = EnvSnapshot::from_pairs([
            (ENV_GATEWAY_TOKEN, "tok"),
            (ENV_DISCORD_BOT_TOKEN, "d"),
            (ENV_ANTHROPIC_BASE_URL, "https://gw.example"),
        ]);

        sync_config(&paths, &env, true).unwrap();
        let first = std::fs::read(&paths.config_file).unwrap();
        let second_sync = sync_config(&paths, &env, true).unwrap();
        let second = std::fs::read(&paths.config_file).unwrap();

        assert_eq!(first, second);
        assert!(!second_sync.changed());
        assert_eq!(second_sync.origin, ConfigOrigin::Existing);
    }
}
