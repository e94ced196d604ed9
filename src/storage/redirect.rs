//! Redirect local state directories into the mounted bucket.
//!
//! Each managed directory becomes a symlink to a subdirectory of the mount.
//! Local content found on the first run is migrated through a staging
//! directory and verified before anything local is removed.

use crate::error::{BootstrapError, Result};
use crate::infra::probe::HostProbe;
use filetime::FileTime;
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// A local directory and the mount subdirectory it should point to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub local: PathBuf,
    pub target: PathBuf,
}

/// Result of redirecting one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// The local path was already a symlink.
    AlreadyLinked,
    /// The symlink was created, after migrating local content if there was any.
    Linked { migrated: Option<TreeStats> },
    /// Redirection was not attempted because the bucket is not mounted.
    Skipped,
    /// Redirection failed; the local directory (if any) is intact unless
    /// `reason` says otherwise.
    Failed { reason: String },
}

/// Entry counts and payload size of a directory tree, excluding the root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub files: u64,
    pub dirs: u64,
    pub symlinks: u64,
    pub bytes: u64,
}

/// Point `redirect.local` at `redirect.target`, migrating local content once.
pub fn redirect_into_mount(redirect: &Redirect, probe: &dyn HostProbe) -> RedirectOutcome {
    let Redirect { local, target } = redirect;

    if let Err(e) = fs::create_dir_all(target) {
        return failed(local, BootstrapError::io(target, e).to_string());
    }

    if probe.is_symlink(local) {
        info!("{} already redirected", local.display());
        return RedirectOutcome::AlreadyLinked;
    }

    let mut migrated = None;
    if probe.path_exists(local) {
        if !local.is_dir() {
            return failed(local, "exists but is not a directory".to_string());
        }

        if dir_has_entries(local) {
            match migrate_tree(local, target) {
                Ok(stats) => {
                    info!(
                        files = stats.files,
                        bytes = stats.bytes,
                        "Migrated {} into {}",
                        local.display(),
                        target.display()
                    );
                    migrated = Some(stats);
                }
                Err(e) => {
                    error!("Migration of {} aborted: {e}", local.display());
                    return failed(local, e.to_string());
                }
            }
        }

        if let Err(e) = fs::remove_dir_all(local) {
            return failed(
                local,
                format!("content copied but local directory could not be removed: {e}"),
            );
        }
    }

    if let Some(parent) = local.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return failed(local, BootstrapError::io(parent, e).to_string());
        }
    }

    if let Err(e) = std::os::unix::fs::symlink(target, local) {
        return failed(local, format!("symlink to {} failed: {e}", target.display()));
    }

    info!("Redirected {} -> {}", local.display(), target.display());
    RedirectOutcome::Linked { migrated }
}

fn failed(local: &Path, reason: String) -> RedirectOutcome {
    warn!("Cannot redirect {} into bucket: {reason}", local.display());
    RedirectOutcome::Failed { reason }
}

fn dir_has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Copy `src` into a staging directory next to `dst`, verify the copy, then
/// merge it into `dst`. Files already in `dst` are overwritten by the local
/// copy; directories are merged.
fn migrate_tree(src: &Path, dst: &Path) -> Result<TreeStats> {
    let staging_parent = dst.parent().unwrap_or(dst);
    let staging = tempfile::Builder::new()
        .prefix(".mylobster-migrate-")
        .tempdir_in(staging_parent)
        .map_err(|e| BootstrapError::io(staging_parent, e))?;

    copy_tree(src, staging.path())?;

    let expected = tree_stats(src)?;
    let copied = tree_stats(staging.path())?;
    if expected != copied {
        return Err(BootstrapError::Migration {
            path: src.to_path_buf(),
            reason: format!("expected {expected:?}, staged copy has {copied:?}"),
        });
    }

    merge_move(staging.path(), dst)?;
    Ok(copied)
}

/// Recursively copy `src` into the existing directory `dst` the way
/// `cp -a` does: symlinks are recreated as symlinks, and ownership, mode
/// and timestamps are carried over.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let mut dirs = Vec::new();

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            BootstrapError::io(&path, e.into())
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let to = dst.join(rel);
        let meta = entry
            .metadata()
            .map_err(|e| BootstrapError::io(entry.path(), e.into()))?;

        if meta.is_dir() {
            fs::create_dir_all(&to).map_err(|e| BootstrapError::io(&to, e))?;
            dirs.push((meta, to));
        } else if meta.file_type().is_symlink() {
            let link =
                fs::read_link(entry.path()).map_err(|e| BootstrapError::io(entry.path(), e))?;
            std::os::unix::fs::symlink(&link, &to).map_err(|e| BootstrapError::io(&to, e))?;
            copy_attributes(&meta, &to)?;
        } else {
            fs::copy(entry.path(), &to).map_err(|e| BootstrapError::io(&to, e))?;
            copy_attributes(&meta, &to)?;
        }
    }

    // Directories go last, deepest first: filling a directory bumps its
    // mtime, and a read-only mode would block the copy.
    for (meta, to) in dirs.into_iter().rev() {
        copy_attributes(&meta, &to)?;
    }
    Ok(())
}

/// Apply owner, mode and timestamps from `meta` to `to` without following
/// a symlink at `to`.
fn copy_attributes(meta: &fs::Metadata, to: &Path) -> Result<()> {
    let is_symlink = meta.file_type().is_symlink();

    // chown needs privileges unless the owner is already ours.
    if let Err(e) = std::os::unix::fs::lchown(to, Some(meta.uid()), Some(meta.gid())) {
        debug!("Keeping current owner of {}: {e}", to.display());
    }

    // Symlink modes are not settable on Linux, and chown can clear setuid bits.
    if !is_symlink {
        fs::set_permissions(to, meta.permissions()).map_err(|e| BootstrapError::io(to, e))?;
    }

    let atime = FileTime::from_last_access_time(meta);
    let mtime = FileTime::from_last_modification_time(meta);
    filetime::set_symlink_file_times(to, atime, mtime).map_err(|e| BootstrapError::io(to, e))
}

/// Count entries and regular-file bytes under `root`.
pub fn tree_stats(root: &Path) -> Result<TreeStats> {
    let mut stats = TreeStats::default();
    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            BootstrapError::io(&path, e.into())
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            stats.dirs += 1;
        } else if file_type.is_symlink() {
            stats.symlinks += 1;
        } else {
            stats.files += 1;
            stats.bytes += entry
                .metadata()
                .map_err(|e| BootstrapError::io(entry.path(), e.into()))?
                .len();
        }
    }
    Ok(stats)
}

/// Move every entry of `src` into `dst`, descending into directories that
/// exist on both sides.
fn merge_move(src: &Path, dst: &Path) -> Result<()> {
    let entries = fs::read_dir(src).map_err(|e| BootstrapError::io(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BootstrapError::io(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let from_is_dir = entry
            .file_type()
            .map_err(|e| BootstrapError::io(&from, e))?
            .is_dir();
        let to_meta = fs::symlink_metadata(&to).ok();

        match to_meta {
            Some(meta) if meta.is_dir() && from_is_dir => {
                merge_move(&from, &to)?;
                fs::remove_dir(&from).map_err(|e| BootstrapError::io(&from, e))?;
            }
            Some(meta) if meta.is_dir() => {
                fs::remove_dir_all(&to).map_err(|e| BootstrapError::io(&to, e))?;
                fs::rename(&from, &to).map_err(|e| BootstrapError::io(&to, e))?;
            }
            Some(_) if from_is_dir => {
                fs::remove_file(&to).map_err(|e| BootstrapError::io(&to, e))?;
                fs::rename(&from, &to).map_err(|e| BootstrapError::io(&to, e))?;
            }
            _ => {
                fs::rename(&from, &to).map_err(|e| BootstrapError::io(&to, e))?;
            }
        }
    }
    Ok(())
}
