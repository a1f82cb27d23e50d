// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue execution and worker event handling.

use runq_core::{Clock, EnvironmentState, ManagerState, PlanStatus, PlanUid};
use runq_wire::control::ControlReply;
use runq_wire::worker::WorkerNotification;
use tracing::{debug, error, info, warn};

use super::Manager;

impl<C: Clock> Manager<C> {
    /// Begin queue execution. Gate: manager idle AND environment open.
    pub(crate) async fn handle_queue_start(&mut self) -> ControlReply {
        if self.state != ManagerState::Idle {
            return ControlReply::err(format!("manager is busy (state: '{}')", self.state));
        }
        if self.env_state != EnvironmentState::Open {
            return ControlReply::err("environment is not open");
        }
        self.state = ManagerState::ExecutingQueue;
        info!("queue execution started");
        self.advance_queue().await;
        ControlReply::ok()
    }

    /// The queue execution loop body: honor a pending stop, stop on an
    /// empty queue, otherwise pop the front item and emit it to the
    /// worker. The popped item sits in the running slot until a terminal
    /// event or a pause arrives.
    pub(crate) async fn advance_queue(&mut self) {
        loop {
            if self.state != ManagerState::ExecutingQueue {
                return;
            }
            if self.queue_stop_pending {
                self.queue_stop_pending = false;
                self.state = ManagerState::Idle;
                let _ = self.persist();
                info!("queue stop honored; execution stopped");
                return;
            }
            let Some(item) = self.queue.pop_front() else {
                self.state = ManagerState::Idle;
                let _ = self.persist();
                info!("queue is empty; execution finished");
                return;
            };

            self.running = Some(item.clone());
            if let Err(e) = self.persist() {
                warn!("failed to persist running slot: {e}");
            }

            let Some(worker) = self.worker.as_ref() else {
                warn!("no worker link; stopping execution");
                self.running = None;
                self.queue.push_front(item);
                self.state = ManagerState::Idle;
                let _ = self.persist();
                return;
            };

            match worker.run_plan(&item).await {
                Ok(ack) if ack.success => {
                    info!(uid = %item.plan_uid, plan = %item.name, "plan emitted to worker");
                    return;
                }
                Ok(ack) => {
                    // The engine never accepted the plan (e.g. unknown
                    // name): record the failure and keep the queue moving.
                    warn!(uid = %item.plan_uid, "worker rejected plan: {}", ack.msg);
                    self.finish_running(PlanStatus::Failed, Some(ack.msg));
                }
                Err(e) => {
                    warn!("run_plan call failed: {e}");
                    self.running = None;
                    self.queue.push_front(item);
                    self.state = ManagerState::Idle;
                    let _ = self.persist();
                    return;
                }
            }
        }
    }

    pub(crate) async fn handle_worker_event(&mut self, event: WorkerNotification) {
        match event {
            WorkerNotification::EnvironmentReady => {
                if self.env_state == EnvironmentState::Opening {
                    self.env_state = EnvironmentState::Open;
                    if self.state == ManagerState::CreatingEnvironment {
                        self.state = ManagerState::Idle;
                    }
                    let _ = self.persist();
                    info!("environment is open");
                }
                // A duplicate (reconnect catch-up) is harmless.
            }
            WorkerNotification::EnvironmentFailed { err_msg } => {
                if self.env_state == EnvironmentState::Opening {
                    error!("environment failed to open: {err_msg}");
                    self.drop_worker_link();
                    let _ = self.watchdog.join_re_worker(super::WORKER_JOIN_TIMEOUT).await;
                    self.env_state = EnvironmentState::Closed;
                    self.state = ManagerState::Idle;
                    self.last_env_error = Some(err_msg);
                    let _ = self.persist();
                }
            }
            WorkerNotification::PlanStatus { uid, status, err_msg } => {
                self.handle_plan_status(uid, status, err_msg).await;
            }
            WorkerNotification::HeartbeatWorker { .. } => {
                self.last_worker_heartbeat_ms = Some(self.clock.epoch_ms());
            }
        }
    }

    async fn handle_plan_status(
        &mut self,
        uid: PlanUid,
        status: PlanStatus,
        err_msg: Option<String>,
    ) {
        let matches_running =
            self.running.as_ref().map(|item| item.plan_uid == uid).unwrap_or(false);
        if !matches_running {
            // Worker protocol error: an event for a plan we don't think is
            // running. Resynchronize via status; destroy if impossible.
            warn!(%uid, %status, "plan_status for an unexpected uid; resynchronizing");
            self.resync_after_protocol_error().await;
            return;
        }

        match status {
            PlanStatus::Running => {
                debug!(%uid, "plan running");
                if self.state == ManagerState::Paused {
                    self.state = ManagerState::ExecutingQueue;
                }
            }
            PlanStatus::Paused => {
                info!(%uid, "plan paused");
                self.state = ManagerState::Paused;
            }
            PlanStatus::Aborted | PlanStatus::Halted => {
                // The plan is NOT re-queued; restarting takes an explicit
                // queue_start.
                self.finish_running(status, err_msg);
                self.state = ManagerState::Idle;
                self.queue_stop_pending = false;
                let _ = self.persist();
            }
            PlanStatus::Completed | PlanStatus::Stopped | PlanStatus::Failed => {
                self.finish_running(status, err_msg);
                self.state = ManagerState::ExecutingQueue;
                self.advance_queue().await;
            }
        }
    }

    async fn resync_after_protocol_error(&mut self) {
        let status = match self.worker.as_ref() {
            Some(worker) => worker.status().await,
            None => return,
        };
        match status {
            Ok(st) => {
                self.adopt_worker_status(st);
                let _ = self.persist();
            }
            Err(e) => {
                error!("resynchronization failed: {e}");
                self.destroy_environment_forced("worker protocol error").await;
            }
        }
    }

    /// The worker link hit EOF. Expected during an orderly teardown (the
    /// generation bump filters those); anything else is a crash or a
    /// still-alive worker whose link broke.
    pub(crate) async fn handle_worker_gone(&mut self) {
        if matches!(
            self.env_state,
            EnvironmentState::Closing | EnvironmentState::Destroying | EnvironmentState::Closed
        ) {
            return;
        }
        warn!("worker link closed unexpectedly");
        self.drop_worker_link();
        self.resync_with_worker().await;
    }
}
