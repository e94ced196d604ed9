//! Host state probes.
//!
//! Everything the bootstrap needs to know about the host (mount table,
//! running processes, path kinds) goes through [`HostProbe`], so the
//! reconciliation stages can run against a fake in tests.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read-only view of host state.
pub trait HostProbe: Send + Sync {
    /// Whether the mount table lists a filesystem mounted at `path`.
    fn is_mounted(&self, path: &Path) -> bool;

    /// Whether a gateway process is already running on this host.
    fn gateway_running(&self) -> bool;

    /// Whether anything (including a dangling symlink) exists at `path`.
    fn path_exists(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path).is_ok()
    }

    fn is_symlink(&self, path: &Path) -> bool {
        std::fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }
}

/// Probe backed by `/proc`.
#[derive(Debug, Clone)]
pub struct SystemProbe {
    mounts_file: PathBuf,
    proc_root: PathBuf,
    gateway_bin: String,
}

impl SystemProbe {
    pub fn new(gateway_bin: &str) -> Self {
        Self {
            mounts_file: PathBuf::from("/proc/mounts"),
            proc_root: PathBuf::from("/proc"),
            gateway_bin: binary_name(gateway_bin).to_string(),
        }
    }
}

impl HostProbe for SystemProbe {
    fn is_mounted(&self, path: &Path) -> bool {
        let table = match std::fs::read_to_string(&self.mounts_file) {
            Ok(t) => t,
            Err(e) => {
                warn!("Cannot read mount table {}: {e}", self.mounts_file.display());
                return false;
            }
        };
        let path = path.to_string_lossy();
        let target = normalize_mount_point(&path);
        parse_mount_points(&table)
            .iter()
            .any(|mp| normalize_mount_point(mp) == target)
    }

    fn gateway_running(&self) -> bool {
        let entries = match std::fs::read_dir(&self.proc_root) {
            Ok(e) => e,
            Err(e) => {
                warn!("Cannot scan {}: {e}", self.proc_root.display());
                return false;
            }
        };
        let own_pid = std::process::id();

        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            if pid == own_pid {
                continue;
            }
            // Processes can exit between readdir and read.
            let Ok(raw) = std::fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let args: Vec<String> = raw
                .split(|b| *b == 0)
                .filter(|a| !a.is_empty())
                .map(|a| String::from_utf8_lossy(a).into_owned())
                .collect();
            if cmdline_is_gateway(&args, &self.gateway_bin) {
                debug!(pid, "Found running gateway process");
                return true;
            }
        }
        false
    }
}

/// Extract mount points (second field) from `/proc/mounts` content,
/// decoding the kernel's octal escapes (`\040` for space and so on).
pub fn parse_mount_points(table: &str) -> Vec<String> {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(unescape_mount_field)
        .collect()
}

fn unescape_mount_field(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_triplet(&bytes[i + 1..i + 4]) {
            let value = (bytes[i + 1] - b'0') * 64
                + (bytes[i + 2] - b'0') * 8
                + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_triplet(b: &[u8]) -> bool {
    b.len() == 3 && b[0] <= b'3' && b.iter().all(|c| (b'0'..=b'7').contains(c))
}

fn normalize_mount_point(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

fn binary_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Whether a process argv is `<...>/<gateway_bin> gateway ...`.
///
/// The binary may appear after an interpreter (`node /usr/bin/mylobster
/// gateway`), so every position is checked.
pub fn cmdline_is_gateway(args: &[String], gateway_bin: &str) -> bool {
    args.windows(2)
        .any(|w| binary_name(&w[0]) == gateway_bin && w[1] == "gateway")
}
