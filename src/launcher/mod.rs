//! Gateway handoff.
//!
//! The last stage of the bootstrap: clear stale locks, build the gateway
//! command line, and replace this process with the gateway.

use crate::config::{DEFAULT_BIND_MODE, DEFAULT_GATEWAY_PORT};
use crate::error::{BootstrapError, Result};
use nix::unistd::execvp;
use std::convert::Infallible;
use std::ffi::CString;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// The exact command the bootstrap hands the process over to.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl GatewayInvocation {
    /// Build the gateway command line.
    ///
    /// With a token the gateway uses static token auth; without one it
    /// falls back to device pairing.
    pub fn new(program: &str, token: Option<&str>) -> Self {
        let mut args = vec![
            "gateway".to_string(),
            "--port".to_string(),
            DEFAULT_GATEWAY_PORT.to_string(),
            "--verbose".to_string(),
            "--allow-unconfigured".to_string(),
            "--bind".to_string(),
            DEFAULT_BIND_MODE.to_string(),
        ];
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            args.push("--token".to_string());
            args.push(token.to_string());
        }
        Self {
            program: program.to_string(),
            args,
        }
    }

    pub fn uses_token(&self) -> bool {
        self.args.iter().any(|a| a == "--token")
    }

    /// Arguments with the token value masked, safe to log or print.
    pub fn redacted_args(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.args.len());
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                out.push("<redacted>".to_string());
                mask_next = false;
            } else {
                mask_next = arg == "--token";
                out.push(arg.clone());
            }
        }
        out
    }
}

impl std::fmt::Debug for GatewayInvocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayInvocation")
            .field("program", &self.program)
            .field("args", &self.redacted_args())
            .finish()
    }
}

/// Remove leftover gateway lock files. Missing files are fine.
pub fn remove_stale_locks(lock_files: &[PathBuf]) {
    for lock in lock_files {
        match std::fs::remove_file(lock) {
            Ok(()) => info!("Removed stale lock {}", lock.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No lock at {}", lock.display());
            }
            Err(e) => warn!("Failed to remove lock {}: {e}", lock.display()),
        }
    }
}

/// Replace the current process with the gateway.
///
/// Only returns on failure.
pub fn exec_gateway(invocation: &GatewayInvocation) -> Result<Infallible> {
    let program = to_cstring(&invocation.program, "gateway program")?;
    let mut argv = Vec::with_capacity(invocation.args.len() + 1);
    argv.push(program.clone());
    for arg in &invocation.args {
        argv.push(to_cstring(arg, "gateway argument")?);
    }

    info!(
        program = %invocation.program,
        args = ?invocation.redacted_args(),
        auth = if invocation.uses_token() { "token" } else { "pairing" },
        "Handing off to gateway"
    );

    execvp(&program, argv.as_slice()).map_err(|source| BootstrapError::Exec {
        program: invocation.program.clone(),
        source,
    })
}

fn to_cstring(value: &str, what: &str) -> Result<CString> {
    CString::new(value).map_err(|_| BootstrapError::InvalidArgument(what.to_string()))
}
