// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State enums shared across the process tree.

use serde::{Deserialize, Serialize};

/// State of the manager control loop. Sole owner: the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerState {
    Idle,
    CreatingEnvironment,
    ExecutingQueue,
    Paused,
    ClosingEnvironment,
    DestroyingEnvironment,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::CreatingEnvironment => "creating_environment",
            Self::ExecutingQueue => "executing_queue",
            Self::Paused => "paused",
            Self::ClosingEnvironment => "closing_environment",
            Self::DestroyingEnvironment => "destroying_environment",
        };
        write!(f, "{s}")
    }
}

/// Whether a worker process exists and has finished loading its startup
/// profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentState {
    Closed,
    Opening,
    Open,
    Closing,
    Destroying,
}

impl std::fmt::Display for EnvironmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Destroying => "destroying",
        };
        write!(f, "{s}")
    }
}

/// Worker-side execution state, reported in the worker status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecState {
    Idle,
    Running,
    Paused,
}

impl std::fmt::Display for ExecState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

/// Status of a plan execution as reported by the worker. The terminal
/// statuses are the ones recorded in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Running,
    Paused,
    Completed,
    Stopped,
    Aborted,
    Halted,
    Failed,
}

impl PlanStatus {
    /// A plan in a terminal status leaves the running slot and is appended
    /// to history.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Stopped | Self::Aborted | Self::Halted | Self::Failed
        )
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Aborted => "aborted",
            Self::Halted => "halted",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Pause mode for `re_pause`: deferred pauses at the next checkpoint after
/// the current step finishes, immediate interrupts the step in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseMode {
    Deferred,
    Immediate,
}

impl Default for PauseMode {
    fn default() -> Self {
        Self::Deferred
    }
}

impl std::fmt::Display for PauseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deferred => "deferred",
            Self::Immediate => "immediate",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
