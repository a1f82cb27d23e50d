// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the manager process.
//!
//! The watchdog spawns the manager with the state directory and socket
//! paths in the environment, and re-spawns it with the same values after a
//! heartbeat timeout, so a restarted manager finds the same endpoints.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ManagerError;

/// Deadline for control-link calls (manager -> watchdog).
pub const CONTROL_CALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Deadline for worker commands. `run_plan`'s terminal outcome is awaited
/// as an event, never as the RPC reply, so this bounds only the ack.
pub const WORKER_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat emit period.
pub const HEARTBEAT_PERIOD: Duration = Duration::from_millis(500);

/// Resolve state directory: RUNQ_STATE_DIR > XDG_STATE_HOME/runq > ~/.local/state/runq
pub fn state_dir() -> Result<PathBuf, ManagerError> {
    if let Some(dir) = std::env::var_os("RUNQ_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("runq"));
    }
    let home = std::env::var_os("HOME").ok_or(ManagerError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/runq"))
}

/// Paths and endpoints the manager operates on.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub state_dir: PathBuf,
    /// Watchdog<->Manager endpoint (the watchdog binds it).
    pub watchdog_sock: PathBuf,
    /// Manager<->Worker endpoint (the worker binds it).
    pub worker_sock: PathBuf,
    /// Control channel endpoint (this manager binds it).
    pub control_sock: PathBuf,
    /// Queue snapshot file.
    pub snapshot_path: PathBuf,
    /// Directory for the manager log file.
    pub log_dir: PathBuf,
}

impl ManagerConfig {
    /// Load the configuration from the environment.
    pub fn load() -> Result<Self, ManagerError> {
        let state_dir = state_dir()?;
        Ok(Self::for_state_dir(state_dir))
    }

    /// Derive every path from a state directory, honoring explicit socket
    /// overrides.
    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        let run_dir = state_dir.join("run");
        let sock = |var: &str, default: PathBuf| {
            std::env::var_os(var).map(PathBuf::from).unwrap_or(default)
        };
        Self {
            watchdog_sock: sock("RUNQ_WATCHDOG_SOCK", run_dir.join("watchdog.sock")),
            worker_sock: sock("RUNQ_WORKER_SOCK", run_dir.join("worker.sock")),
            control_sock: sock("RUNQ_CONTROL_SOCK", run_dir.join("control.sock")),
            snapshot_path: state_dir.join("queue.json"),
            log_dir: state_dir.join("logs"),
            state_dir,
        }
    }
}
