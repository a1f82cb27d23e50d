// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages on the Watchdog<->Manager link.
//!
//! The manager is the only caller; the watchdog only replies. The watchdog
//! holds the worker's OS handle, so worker lifecycle requests must go
//! through it — a manager restart must not take the worker down with it.

use serde::{Deserialize, Serialize};

/// Heartbeat payload value the watchdog accepts.
pub const HEARTBEAT_ALIVE: &str = "alive";

/// Requests from the manager that expect a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum WatchdogRequest {
    /// Spawn a worker process. Quick: does not wait for the worker to
    /// finish loading its startup profile.
    StartReWorker,
    /// Join/reap the worker after an orderly shutdown negotiation.
    JoinReWorker { timeout_ms: u64 },
    /// Force-terminate an unresponsive worker (SIGKILL).
    KillReWorker,
    /// OS-level liveness check. Running does not imply responsive.
    IsWorkerAlive,
}

/// Notifications from the manager (no reply).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum WatchdogNotification {
    /// Intentional manager exit; disables auto-restart.
    ManagerStopping,
    /// Liveness signal; resets the watchdog's heartbeat timestamp.
    Heartbeat { value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartReWorkerReply {
    pub success: bool,
    #[serde(default)]
    pub err_msg: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinReWorkerReply {
    /// True when the worker is no longer alive after the join timeout.
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillReWorkerReply {
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsWorkerAliveReply {
    pub worker_alive: bool,
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
