//! Bucket persistence: mounting and directory redirection.

pub mod mount;
pub mod redirect;

pub use mount::{reconcile_mount, MountRequest, MountRunner, MountStatus, S3fsRunner};
pub use redirect::{redirect_into_mount, Redirect, RedirectOutcome, TreeStats};
