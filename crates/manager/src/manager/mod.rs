// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The manager state machine and its control loop.
//!
//! One logical loop processes external client requests AND worker events
//! in FIFO order; no two commands mutate state concurrently. A request
//! that needs worker action is acknowledged once the instruction has been
//! issued to the worker, not when it completes.

mod environment;
mod execution;
mod handlers;

use std::time::Duration;

use runq_core::{
    Clock, EnvironmentState, History, HistoryEntry, ManagerState, PlanItem, PlanQueue, PlanStatus,
    SystemClock,
};
use runq_storage::{QueueSnapshot, QueueStore, StoreError};
use runq_wire::control::{ControlReply, ControlRequest};
use runq_wire::worker::WorkerNotification;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::env::ManagerConfig;
use crate::error::ManagerError;
use crate::watchdog_link::WatchdogLink;
use crate::worker_link::WorkerLink;

/// How long the worker gets to exit after an orderly shutdown before it is
/// joined.
pub(crate) const WORKER_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// How long to wait for a freshly spawned worker to bind its socket.
pub(crate) const WORKER_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period for final replies to flush before the process exits.
const EXIT_GRACE: Duration = Duration::from_millis(100);

/// Messages consumed by the control loop.
#[derive(Debug)]
pub enum ManagerMsg {
    /// External client request with its reply slot.
    Client {
        req: ControlRequest,
        request_uid: Option<String>,
        reply: oneshot::Sender<ControlReply>,
    },
    /// Worker notification, stamped with the link generation it arrived
    /// on.
    Worker { generation: u64, event: WorkerNotification },
    /// The worker link reached EOF.
    WorkerGone { generation: u64 },
}

pub struct Manager<C: Clock = SystemClock> {
    pub(crate) cfg: ManagerConfig,
    pub(crate) clock: C,

    pub(crate) state: ManagerState,
    pub(crate) env_state: EnvironmentState,
    pub(crate) queue: PlanQueue,
    pub(crate) history: History,
    pub(crate) running: Option<PlanItem>,
    pub(crate) queue_stop_pending: bool,
    pub(crate) last_env_error: Option<String>,
    pub(crate) last_worker_heartbeat_ms: Option<u64>,

    pub(crate) store: QueueStore,
    pub(crate) watchdog: WatchdogLink,
    pub(crate) worker: Option<WorkerLink>,
    /// Bumped whenever a worker link is dropped; stale events are ignored.
    pub(crate) worker_gen: u64,
    pub(crate) msg_tx: mpsc::Sender<ManagerMsg>,

    /// Set by `manager_kill`: consume messages but never reply or
    /// heartbeat, so the watchdog restarts us.
    pub(crate) killed: bool,
    pub(crate) kill_tx: watch::Sender<bool>,
    /// Set by `manager_stop`: exit the loop after the reply is sent.
    pub(crate) stopping: bool,
}

impl<C: Clock> Manager<C> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        cfg: ManagerConfig,
        clock: C,
        snapshot: Option<QueueSnapshot>,
        store: QueueStore,
        watchdog: WatchdogLink,
        msg_tx: mpsc::Sender<ManagerMsg>,
        kill_tx: watch::Sender<bool>,
    ) -> Self {
        let (queue, history, running, env_state) = match snapshot {
            Some(snap) => (
                PlanQueue::from_items(snap.queue),
                History::from_entries(snap.history),
                snap.running,
                snap.env_state,
            ),
            None => (PlanQueue::new(), History::new(), None, EnvironmentState::Closed),
        };
        Self {
            cfg,
            clock,
            state: ManagerState::Idle,
            env_state,
            queue,
            history,
            running,
            queue_stop_pending: false,
            last_env_error: None,
            last_worker_heartbeat_ms: None,
            store,
            watchdog,
            worker: None,
            worker_gen: 0,
            msg_tx,
            killed: false,
            kill_tx,
            stopping: false,
        }
    }

    /// Run the control loop to completion (orderly stop or channel close).
    pub async fn run(mut self, mut rx: mpsc::Receiver<ManagerMsg>) -> Result<(), ManagerError> {
        info!(state = %self.state, env = %self.env_state, "manager control loop running");
        while let Some(msg) = rx.recv().await {
            if self.killed {
                // Unresponsiveness sink: consume everything, answer
                // nothing. Reply senders are dropped so clients hang until
                // their own deadline; the heartbeat emitter is already
                // silent.
                continue;
            }
            match msg {
                ManagerMsg::Client { req, reply, .. } => {
                    if matches!(req, ControlRequest::ManagerKill) {
                        warn!("manager_kill received; going silent");
                        self.killed = true;
                        let _ = self.kill_tx.send(true);
                        continue;
                    }
                    let resp = self.handle_request(req).await;
                    let _ = reply.send(resp);
                    if self.stopping {
                        break;
                    }
                }
                ManagerMsg::Worker { generation, event } => {
                    if generation != self.worker_gen {
                        continue;
                    }
                    self.handle_worker_event(event).await;
                }
                ManagerMsg::WorkerGone { generation } => {
                    if generation != self.worker_gen {
                        continue;
                    }
                    self.handle_worker_gone().await;
                }
            }
        }
        if self.stopping {
            info!("manager stopping");
            // Let the final reply drain before the process exits.
            tokio::time::sleep(EXIT_GRACE).await;
        }
        Ok(())
    }

    /// Dispatch one client request. Exhaustive: adding a command to the
    /// wire enum forces a branch here.
    pub(crate) async fn handle_request(&mut self, req: ControlRequest) -> ControlReply {
        match req {
            ControlRequest::Ping => self.handle_ping(),
            ControlRequest::Status => self.handle_status(),

            ControlRequest::QueueItemAdd { item, pos } => self.handle_queue_item_add(item, pos),
            ControlRequest::QueueItemGet { item } => self.handle_queue_item_get(item),
            ControlRequest::QueuePlanRemove { item } => self.handle_queue_plan_remove(item),
            ControlRequest::QueuePlanMove { src, dst } => self.handle_queue_plan_move(src, dst),
            ControlRequest::QueueGet => self.handle_queue_get(),
            ControlRequest::QueueClear => self.handle_queue_clear(),

            ControlRequest::QueueStart => self.handle_queue_start().await,
            ControlRequest::QueueStop => self.handle_queue_stop(),
            ControlRequest::QueueStopCancel => self.handle_queue_stop_cancel(),

            ControlRequest::EnvironmentOpen => self.handle_environment_open().await,
            ControlRequest::EnvironmentClose => self.handle_environment_close().await,
            ControlRequest::EnvironmentDestroy => self.handle_environment_destroy().await,

            ControlRequest::RePause { mode } => self.handle_re_pause(mode).await,
            ControlRequest::ReResume => self.handle_re_resume().await,
            ControlRequest::ReStop => self.handle_re_stop().await,
            ControlRequest::ReAbort => self.handle_re_abort().await,
            ControlRequest::ReHalt => self.handle_re_halt().await,

            ControlRequest::HistoryGet => self.handle_history_get(),
            ControlRequest::HistoryClear => self.handle_history_clear(),

            ControlRequest::PlansAllowed => self.handle_plans_allowed().await,
            ControlRequest::DevicesAllowed => self.handle_devices_allowed().await,

            ControlRequest::ManagerStop { option } => self.handle_manager_stop(option).await,
            // Handled in the loop before dispatch; kept for exhaustiveness.
            ControlRequest::ManagerKill => ControlReply::ok(),
        }
    }

    /// Persist the current state. Mutating commands call this BEFORE their
    /// reply is sent (synchronous persistence).
    pub(crate) fn persist(&self) -> Result<(), StoreError> {
        let snapshot = QueueSnapshot::new(
            self.queue.snapshot(),
            self.history.snapshot(),
            self.running.clone(),
            self.env_state,
        );
        self.store.save(&snapshot)
    }

    /// Record a terminal status for the plan in the running slot.
    pub(crate) fn finish_running(&mut self, status: PlanStatus, err_msg: Option<String>) {
        if let Some(item) = self.running.take() {
            info!(uid = %item.plan_uid, plan = %item.name, status = %status, "plan finished");
            self.history.append(HistoryEntry {
                item,
                status,
                err_msg,
                finished_at_epoch_ms: self.clock.epoch_ms(),
            });
            if let Err(e) = self.persist() {
                warn!("failed to persist history entry: {e}");
            }
        }
    }

    /// Fail the running plan (if any) and put it back at the front of the
    /// queue. Used when the environment is destroyed or the worker dies
    /// under a plan; execution resumes when a new environment opens.
    pub(crate) fn fail_running_plan_requeue(&mut self, reason: &str) {
        if let Some(item) = self.running.take() {
            warn!(uid = %item.plan_uid, reason, "running plan interrupted; re-queueing at front");
            self.history.append(HistoryEntry {
                item: item.clone(),
                status: PlanStatus::Failed,
                err_msg: Some(reason.to_string()),
                finished_at_epoch_ms: self.clock.epoch_ms(),
            });
            self.queue.push_front(item);
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
