use crate::error::{BootstrapError, Result};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Maximum size for a config file (10 MB).
pub const MAX_CONFIG_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Parse a config document leniently.
///
/// Strict JSON is tried first, then JSON5 (the dialect the gateway itself
/// accepts). Anything unparseable, or a top-level value that is not an
/// object, becomes an empty object.
pub fn parse_config_lenient(content: &str) -> Map<String, Value> {
    let parsed = serde_json::from_str::<Value>(content)
        .or_else(|_| json5::from_str::<Value>(content));

    match parsed {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(
                kind = value_kind(&other),
                "Config document is not a JSON object, starting from an empty object"
            );
            Map::new()
        }
        Err(e) => {
            warn!("Config document failed to parse ({e}), starting from an empty object");
            Map::new()
        }
    }
}

/// Read the config file leniently. A missing, unreadable or oversized file
/// yields an empty object.
pub fn read_config_lenient(path: &Path) -> Map<String, Value> {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.len() > MAX_CONFIG_FILE_BYTES {
            warn!(
                size = meta.len(),
                limit = MAX_CONFIG_FILE_BYTES,
                "Config file '{}' is too large, starting from an empty object",
                path.display()
            );
            return Map::new();
        }
    }

    match std::fs::read_to_string(path) {
        Ok(content) => parse_config_lenient(&content),
        Err(e) => {
            warn!(
                "Cannot read config file '{}' ({e}), starting from an empty object",
                path.display()
            );
            Map::new()
        }
    }
}

/// Render a document the way it is stored on disk: 2-space pretty JSON
/// with a trailing newline.
pub fn render_config(config: &Map<String, Value>) -> Result<String> {
    let mut content = serde_json::to_string_pretty(config)?;
    content.push('\n');
    Ok(content)
}

/// Compute a hash of a configuration snapshot for change detection.
pub fn resolve_config_snapshot_hash(config: &Map<String, Value>) -> String {
    use sha2::{Digest, Sha256};
    let canonical = serde_json::to_string(config).unwrap_or_default();
    let hash = Sha256::digest(canonical.as_bytes());
    hex::encode(hash)
}

/// Write the configuration atomically.
pub fn write_config_atomic(path: &Path, config: &Map<String, Value>) -> Result<()> {
    let content = render_config(config)?;
    write_atomic(path, content.as_bytes())?;
    debug!("Wrote config to {}", path.display());
    Ok(())
}

/// Replace `path` with `content` atomically.
///
/// The content goes to a temp file in the target directory, is synced, and
/// then renamed over the target, so readers only ever see the old or the
/// new file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let path = resolve_write_target(path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    std::fs::create_dir_all(dir).map_err(|e| BootstrapError::io(dir, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".mylobster.")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| BootstrapError::io(dir, e))?;
    tmp.write_all(content)
        .map_err(|e| BootstrapError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| BootstrapError::io(tmp.path(), e))?;
    tmp.persist(&path)
        .map_err(|e| BootstrapError::io(&path, e.error))?;
    Ok(())
}

/// Where a write to `path` lands. A symlink at `path` is followed one level
/// so the rename replaces the target file, not the link.
pub fn resolve_write_target(path: &Path) -> PathBuf {
    match std::fs::read_link(path) {
        Ok(target) if target.is_absolute() => target,
        Ok(target) => path.parent().map_or(target.clone(), |p| p.join(&target)),
        Err(_) => path.to_path_buf(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
