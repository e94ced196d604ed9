//! Default configuration constants used across the bootstrap.

/// Gateway port, forced on every sync and passed on the command line.
pub const DEFAULT_GATEWAY_PORT: u16 = 18789;

/// Gateway mode written into the config.
pub const DEFAULT_GATEWAY_MODE: &str = "local";

/// Bind mode passed to the gateway.
pub const DEFAULT_BIND_MODE: &str = "lan";

/// Proxies the gateway trusts for forwarded client addresses.
pub const DEFAULT_TRUSTED_PROXIES: &[&str] = &["10.1.0.0"];

/// Model pinned as `agents.defaults.model.primary` on every restart.
pub const DEFAULT_MODEL: &str = "anthropic/claude-opus-4-5";

/// DM policy applied to a channel when no override is given.
pub const DEFAULT_DM_POLICY: &str = "pairing";

/// DM policies the gateway understands.
pub const KNOWN_DM_POLICIES: &[&str] = &["pairing", "allowlist", "open", "disabled"];

/// Context window advertised for every catalog model.
pub const ANTHROPIC_CONTEXT_WINDOW: u64 = 200_000;

/// Models published when the Anthropic base URL is overridden: (id, name).
pub const ANTHROPIC_MODEL_CATALOG: &[(&str, &str)] = &[
    ("claude-sonnet-4-20250514", "Claude Sonnet 4"),
    ("claude-opus-4-5-20251101", "Claude Opus 4.5"),
    ("claude-3-5-haiku-20241022", "Claude Haiku 3.5"),
];

// ============================================================================
// Paths
// ============================================================================

pub const CONFIG_DIR: &str = "/root/.mylobster";
pub const CONFIG_FILE: &str = "/root/.mylobster/mylobster.json";
pub const TEMPLATE_FILE: &str = "/root/.mylobster-templates/mylobster.json.template";
pub const MOUNT_PATH: &str = "/data/mylobster";
pub const SKILLS_DIR: &str = "/root/mylobster/skills";
pub const DEFAULT_WORKSPACE: &str = "/root/mylobster";

/// Subdirectory of the mount holding the config directory.
pub const MOUNT_CONFIG_SUBDIR: &str = "mylobster";

/// Subdirectory of the mount holding the skills directory.
pub const MOUNT_SKILLS_SUBDIR: &str = "skills";

pub const LOCK_FILES: &[&str] = &["/tmp/mylobster-gateway.lock", "/root/.mylobster/gateway.lock"];

/// Gateway executable, resolved through `PATH`.
pub const DEFAULT_GATEWAY_BIN: &str = "mylobster";

/// Mount utility, resolved through `PATH`.
pub const MOUNT_BIN: &str = "s3fs";

// ============================================================================
// Environment variables
// ============================================================================

pub const ENV_R2_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
pub const ENV_R2_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
pub const ENV_CF_ACCOUNT_ID: &str = "CF_ACCOUNT_ID";
pub const ENV_R2_BUCKET_NAME: &str = "R2_BUCKET_NAME";

pub const ENV_GATEWAY_TOKEN: &str = "MYLOBSTER_GATEWAY_TOKEN";
pub const ENV_DEV_MODE: &str = "MYLOBSTER_DEV_MODE";
pub const ENV_GATEWAY_BIN: &str = "MYLOBSTER_GATEWAY_BIN";

pub const ENV_TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
pub const ENV_TELEGRAM_DM_POLICY: &str = "TELEGRAM_DM_POLICY";
pub const ENV_DISCORD_BOT_TOKEN: &str = "DISCORD_BOT_TOKEN";
pub const ENV_DISCORD_DM_POLICY: &str = "DISCORD_DM_POLICY";
pub const ENV_SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
pub const ENV_SLACK_APP_TOKEN: &str = "SLACK_APP_TOKEN";
pub const ENV_SLACK_DM_POLICY: &str = "SLACK_DM_POLICY";

pub const ENV_ANTHROPIC_BASE_URL: &str = "ANTHROPIC_BASE_URL";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
