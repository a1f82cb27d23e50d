// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The execution engine: runs one plan at a time in discrete steps.
//!
//! Control commands arrive over a channel and are honored at step
//! checkpoints. A deferred pause lets the in-progress step finish first; an
//! immediate pause abandons the remainder of the step's delay (the step is
//! not counted as done and re-runs on resume).

use std::time::Duration;

use runq_core::{PauseMode, PlanItem, PlanStatus, PlanUid};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::profile::PlanDef;

/// Commands forwarded from the manager into the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineControl {
    Pause(PauseMode),
    Resume,
    Stop,
    Abort,
    Halt,
}

/// An execution state transition for the current plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanTransition {
    pub uid: PlanUid,
    pub status: PlanStatus,
    pub err_msg: Option<String>,
}

/// Resolved step parameters for one plan execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionParams {
    pub steps: u32,
    pub step_delay: Duration,
}

impl ExecutionParams {
    /// Item kwargs override the plan definition: `num` (step count) and
    /// `delay` (seconds per step).
    pub fn resolve(item: &PlanItem, def: &PlanDef) -> Self {
        let steps = item
            .kwargs
            .get("num")
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
            .unwrap_or(def.default_steps)
            .max(1);
        let step_delay = item
            .kwargs
            .get("delay")
            .and_then(|v| v.as_f64())
            .filter(|d| *d >= 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::from_millis(def.step_delay_ms));
        Self { steps, step_delay }
    }
}

async fn emit(
    status_tx: &mpsc::Sender<PlanTransition>,
    uid: &PlanUid,
    status: PlanStatus,
    err_msg: Option<String>,
) {
    let _ = status_tx.send(PlanTransition { uid: uid.clone(), status, err_msg }).await;
}

/// Execute one plan to a terminal status.
///
/// Transitions are reported in order: `running`, then any number of
/// `paused`/`running` pairs, then exactly one terminal status.
pub async fn run_plan(
    item: PlanItem,
    params: ExecutionParams,
    mut control_rx: mpsc::Receiver<EngineControl>,
    status_tx: mpsc::Sender<PlanTransition>,
) {
    let uid = item.plan_uid.clone();
    info!(plan = %item.name, uid = %uid, steps = params.steps, "plan started");
    emit(&status_tx, &uid, PlanStatus::Running, None).await;

    let mut step: u32 = 0;
    while step < params.steps {
        let mut pause_requested = false;

        // Run one step, watching for control commands.
        let sleep = tokio::time::sleep(params.step_delay);
        tokio::pin!(sleep);
        let step_done = loop {
            tokio::select! {
                _ = &mut sleep => break true,
                cmd = control_rx.recv() => match cmd {
                    None => {
                        emit(&status_tx, &uid, PlanStatus::Failed,
                            Some("engine control channel closed".to_string())).await;
                        return;
                    }
                    Some(EngineControl::Pause(PauseMode::Deferred)) => pause_requested = true,
                    Some(EngineControl::Pause(PauseMode::Immediate)) => {
                        pause_requested = true;
                        break false;
                    }
                    Some(EngineControl::Stop) => {
                        emit(&status_tx, &uid, PlanStatus::Stopped, None).await;
                        return;
                    }
                    Some(EngineControl::Abort) => {
                        emit(&status_tx, &uid, PlanStatus::Aborted, None).await;
                        return;
                    }
                    Some(EngineControl::Halt) => {
                        emit(&status_tx, &uid, PlanStatus::Halted, None).await;
                        return;
                    }
                    // Not paused; nothing to resume.
                    Some(EngineControl::Resume) => {}
                },
            }
        };
        if step_done {
            step += 1;
            debug!(uid = %uid, step, of = params.steps, "step checkpoint");
        }

        if pause_requested {
            emit(&status_tx, &uid, PlanStatus::Paused, None).await;
            loop {
                match control_rx.recv().await {
                    None => {
                        emit(&status_tx, &uid, PlanStatus::Failed,
                            Some("engine control channel closed".to_string())).await;
                        return;
                    }
                    Some(EngineControl::Resume) => {
                        emit(&status_tx, &uid, PlanStatus::Running, None).await;
                        break;
                    }
                    Some(EngineControl::Stop) => {
                        emit(&status_tx, &uid, PlanStatus::Stopped, None).await;
                        return;
                    }
                    Some(EngineControl::Abort) => {
                        emit(&status_tx, &uid, PlanStatus::Aborted, None).await;
                        return;
                    }
                    Some(EngineControl::Halt) => {
                        emit(&status_tx, &uid, PlanStatus::Halted, None).await;
                        return;
                    }
                    // Already paused.
                    Some(EngineControl::Pause(_)) => {}
                }
            }
        }
    }

    info!(uid = %uid, "plan completed");
    emit(&status_tx, &uid, PlanStatus::Completed, None).await;
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
