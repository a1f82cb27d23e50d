// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchdog configuration from the environment.

use std::path::PathBuf;

use crate::supervisor::SupervisorError;

/// Paths and binaries the supervisor operates on. Everything derives from
/// the state directory; socket paths are also exported to the children so
/// both sides agree on the endpoints.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    pub state_dir: PathBuf,
    pub run_dir: PathBuf,
    pub watchdog_sock: PathBuf,
    pub worker_sock: PathBuf,
    pub control_sock: PathBuf,
    pub lock_path: PathBuf,
    pub log_dir: PathBuf,
    pub manager_bin: PathBuf,
    pub worker_bin: PathBuf,
    pub profile_path: Option<PathBuf>,
}

/// Resolve state directory: RUNQ_STATE_DIR > XDG_STATE_HOME/runq > ~/.local/state/runq
pub fn state_dir() -> Result<PathBuf, SupervisorError> {
    if let Some(dir) = std::env::var_os("RUNQ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("runq"));
    }
    let home = std::env::var_os("HOME").ok_or(SupervisorError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/runq"))
}

impl WatchdogConfig {
    pub fn load() -> Result<Self, SupervisorError> {
        Ok(Self::for_state_dir(state_dir()?))
    }

    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        let run_dir = state_dir.join("run");
        Self {
            watchdog_sock: run_dir.join("watchdog.sock"),
            worker_sock: run_dir.join("worker.sock"),
            control_sock: run_dir.join("control.sock"),
            lock_path: state_dir.join("runqd.pid"),
            log_dir: state_dir.join("logs"),
            manager_bin: bin_path("RUNQ_MANAGER_BIN", "runq-manager"),
            worker_bin: bin_path("RUNQ_WORKER_BIN", "runq-worker"),
            profile_path: std::env::var_os("RUNQ_PROFILE").map(PathBuf::from),
            run_dir,
            state_dir,
        }
    }
}

/// Resolve a child binary: explicit override, else a sibling of this
/// executable, else bare name (PATH lookup at spawn time).
fn bin_path(var: &str, name: &str) -> PathBuf {
    if let Some(path) = std::env::var_os(var) {
        return PathBuf::from(path);
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(name)))
        .filter(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from(name))
}
