// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Messages on the Manager<->Worker link.

use runq_core::{EnvironmentState, ExecState, PauseMode, PlanItem, PlanStatus, PlanUid};
use serde::{Deserialize, Serialize};

/// Commands from the manager that expect a reply.
///
/// `run_plan` is acknowledged as soon as the engine accepts the plan; the
/// terminal outcome arrives later as a `plan_status` notification, never as
/// the RPC reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum WorkerCommand {
    RunPlan { item: PlanItem },
    Pause { mode: PauseMode },
    Resume,
    Stop,
    Abort,
    Halt,
    Status,
    Shutdown,
    PlansAllowedQuery,
    DevicesAllowedQuery,
}

/// Unsolicited notifications from the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum WorkerNotification {
    /// Startup profile finished loading; plan commands are now accepted.
    EnvironmentReady,
    /// Startup profile failed to load; the process will idle until joined.
    EnvironmentFailed { err_msg: String },
    /// Execution state transition for a plan.
    PlanStatus {
        uid: PlanUid,
        status: PlanStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        err_msg: Option<String>,
    },
    /// Worker-side liveness signal.
    HeartbeatWorker { value: String },
}

/// Generic acknowledgement for worker commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandAck {
    pub success: bool,
    #[serde(default)]
    pub msg: String,
}

impl CommandAck {
    pub fn ok() -> Self {
        Self { success: true, msg: String::new() }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { success: false, msg: msg.into() }
    }
}

/// Terminal outcome of the most recently finished plan, retained by the
/// worker so a restarted manager can recover a result it missed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    pub uid: PlanUid,
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

/// Reply to the `status` command. Served at every point in the worker's
/// life, including while the startup profile is still loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerStatusReply {
    pub env_state: EnvironmentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_uid: Option<PlanUid>,
    pub exec_state: ExecState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<PlanResult>,
    /// Protocol version; a mismatch on reconnect forces environment
    /// destroy.
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlansAllowedReply {
    pub plans_allowed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DevicesAllowedReply {
    pub devices_allowed: Vec<String>,
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
