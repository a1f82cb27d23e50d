// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The external control channel: client requests and manager replies.
//!
//! Replies are `{success, msg?, ...result_fields}` objects. Requests may
//! carry a client-generated `request_uid` in the envelope; the manager
//! echoes it so clients can detect duplicate delivery after a retry
//! (`queue_item_add` is not idempotent).

use runq_core::{ItemRef, MoveDestination, PauseMode, PlanSpec, QueuePosition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Safety option for `manager_stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StopOption {
    /// Refuse while a plan is running.
    #[default]
    SafeOn,
    /// Force the exit; a running environment is destroyed first.
    SafeOff,
}

/// Commands accepted on the control channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum ControlRequest {
    Ping,
    Status,

    QueueItemAdd {
        item: PlanSpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pos: Option<QueuePosition>,
    },
    QueueItemGet {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<ItemRef>,
    },
    QueuePlanRemove {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item: Option<ItemRef>,
    },
    QueuePlanMove {
        src: ItemRef,
        dst: MoveDestination,
    },
    QueueGet,
    QueueClear,

    QueueStart,
    QueueStop,
    QueueStopCancel,

    EnvironmentOpen,
    EnvironmentClose,
    EnvironmentDestroy,

    RePause {
        #[serde(default)]
        mode: PauseMode,
    },
    ReResume,
    ReStop,
    ReAbort,
    ReHalt,

    HistoryGet,
    HistoryClear,

    PlansAllowed,
    DevicesAllowed,

    ManagerStop {
        #[serde(default)]
        option: StopOption,
    },
    ManagerKill,
}

/// Reply on the control channel: `success`, optional human message, and
/// command-specific result fields flattened alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl ControlReply {
    pub fn ok() -> Self {
        Self { success: true, msg: None, fields: serde_json::Map::new() }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { success: false, msg: Some(msg.into()), fields: serde_json::Map::new() }
    }

    /// Attach a result field.
    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
