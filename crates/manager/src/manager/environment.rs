// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment lifecycle: open, close, destroy, and reconnection after a
//! manager restart.

use runq_core::{Clock, EnvironmentState, ManagerState};
use runq_wire::control::ControlReply;
use runq_wire::worker::WorkerStatusReply;
use runq_wire::PROTOCOL_VERSION;
use tracing::{error, info, warn};

use super::{Manager, WORKER_CONNECT_TIMEOUT, WORKER_JOIN_TIMEOUT};
use crate::worker_link::WorkerLink;

impl<C: Clock> Manager<C> {
    /// Ask the watchdog to spawn a worker and connect to its endpoint.
    /// Acknowledged once the spawn succeeded; `environment_ready` (or
    /// `environment_failed`) completes the open later.
    pub(crate) async fn handle_environment_open(&mut self) -> ControlReply {
        if self.state != ManagerState::Idle {
            return ControlReply::err(format!("manager is busy (state: '{}')", self.state));
        }
        if self.env_state != EnvironmentState::Closed {
            return ControlReply::err("environment already exists");
        }

        self.state = ManagerState::CreatingEnvironment;
        self.env_state = EnvironmentState::Opening;
        self.last_env_error = None;

        match self.watchdog.start_re_worker().await {
            Ok(reply) if reply.success => {}
            Ok(reply) => {
                self.state = ManagerState::Idle;
                self.env_state = EnvironmentState::Closed;
                return ControlReply::err(format!("failed to start worker: {}", reply.err_msg));
            }
            Err(e) => {
                self.state = ManagerState::Idle;
                self.env_state = EnvironmentState::Closed;
                return ControlReply::err(format!("failed to start worker: {e}"));
            }
        }

        self.worker_gen += 1;
        match WorkerLink::connect(
            &self.cfg.worker_sock,
            WORKER_CONNECT_TIMEOUT,
            self.worker_gen,
            self.msg_tx.clone(),
        )
        .await
        {
            Ok(link) => {
                self.worker = Some(link);
                if let Err(e) = self.persist() {
                    warn!("failed to persist environment state: {e}");
                }
                info!("worker spawned; waiting for the startup profile to load");
                ControlReply::ok()
            }
            Err(e) => {
                // The worker spawned but never bound its socket.
                error!("worker endpoint never appeared: {e}");
                let _ = self.watchdog.kill_re_worker().await;
                let _ = self.watchdog.join_re_worker(WORKER_JOIN_TIMEOUT).await;
                self.state = ManagerState::Idle;
                self.env_state = EnvironmentState::Closed;
                let _ = self.persist();
                ControlReply::err(format!("worker did not come up: {e}"))
            }
        }
    }

    /// Orderly close: shutdown handshake, then join via the watchdog.
    pub(crate) async fn handle_environment_close(&mut self) -> ControlReply {
        if self.state != ManagerState::Idle {
            return ControlReply::err(format!(
                "cannot close the environment while the manager is '{}'",
                self.state
            ));
        }
        if self.env_state != EnvironmentState::Open {
            return ControlReply::err("environment is not open");
        }

        self.state = ManagerState::ClosingEnvironment;
        self.env_state = EnvironmentState::Closing;

        let Some(worker) = self.worker.as_ref() else {
            // No link despite an open environment: inconsistent, force it.
            self.destroy_environment_forced("environment link lost").await;
            return ControlReply::ok();
        };

        match worker.shutdown().await {
            Ok(ack) if ack.success => {
                let joined = match self.watchdog.join_re_worker(WORKER_JOIN_TIMEOUT).await {
                    Ok(reply) => reply.success,
                    Err(_) => false,
                };
                if !joined {
                    warn!("worker did not exit in time; killing it");
                    let _ = self.watchdog.kill_re_worker().await;
                    let _ = self.watchdog.join_re_worker(WORKER_JOIN_TIMEOUT).await;
                }
                self.drop_worker_link();
                self.env_state = EnvironmentState::Closed;
                self.state = ManagerState::Idle;
                self.queue_stop_pending = false;
                let _ = self.persist();
                info!("environment closed");
                ControlReply::ok()
            }
            Ok(ack) => {
                self.state = ManagerState::Idle;
                self.env_state = EnvironmentState::Open;
                ControlReply::err(format!("worker refused to shut down: {}", ack.msg))
            }
            Err(e) => {
                warn!("shutdown handshake failed: {e}; destroying environment");
                self.destroy_environment_forced("shutdown handshake failed").await;
                ControlReply::ok()
            }
        }
    }

    /// Forced teardown, permitted in any state.
    pub(crate) async fn handle_environment_destroy(&mut self) -> ControlReply {
        if self.env_state == EnvironmentState::Closed {
            return ControlReply::err("environment does not exist");
        }
        self.destroy_environment_forced("environment destroyed").await;
        ControlReply::ok()
    }

    /// Kill the worker through the watchdog and return to idle. A running
    /// plan gets a `failed` history entry and is re-queued at the FRONT so
    /// execution resumes when a new environment opens.
    pub(crate) async fn destroy_environment_forced(&mut self, reason: &str) {
        info!(reason, "destroying environment");
        self.state = ManagerState::DestroyingEnvironment;
        self.env_state = EnvironmentState::Destroying;
        self.drop_worker_link();

        let _ = self.watchdog.kill_re_worker().await;
        let _ = self.watchdog.join_re_worker(WORKER_JOIN_TIMEOUT).await;

        self.fail_running_plan_requeue(reason);
        self.queue_stop_pending = false;
        self.env_state = EnvironmentState::Closed;
        self.state = ManagerState::Idle;
        let _ = self.persist();
    }

    pub(crate) fn drop_worker_link(&mut self) {
        if let Some(link) = self.worker.take() {
            link.close();
        }
        // Anything still in flight from the old link is stale now.
        self.worker_gen += 1;
    }

    /// Discover a surviving worker after this manager was (re)spawned and
    /// rebuild execution state from its status reply.
    pub(crate) async fn resync_with_worker(&mut self) {
        let alive = match self.watchdog.is_worker_alive().await {
            Ok(alive) => alive,
            Err(e) => {
                warn!("cannot query worker liveness: {e}");
                false
            }
        };

        if !alive {
            let _ = self.watchdog.join_re_worker(WORKER_JOIN_TIMEOUT).await;
            if self.running.is_some() || self.env_state != EnvironmentState::Closed {
                warn!("no surviving worker; environment is closed");
            }
            self.fail_running_plan_requeue("worker is gone");
            self.queue_stop_pending = false;
            self.env_state = EnvironmentState::Closed;
            self.state = ManagerState::Idle;
            let _ = self.persist();
            return;
        }

        self.worker_gen += 1;
        let link = match WorkerLink::connect(
            &self.cfg.worker_sock,
            WORKER_CONNECT_TIMEOUT,
            self.worker_gen,
            self.msg_tx.clone(),
        )
        .await
        {
            Ok(link) => link,
            Err(e) => {
                warn!("surviving worker is unreachable: {e}; destroying environment");
                self.destroy_environment_forced("worker unreachable after manager restart").await;
                return;
            }
        };
        self.worker = Some(link);

        let status = match self.worker.as_ref() {
            Some(worker) => worker.status().await,
            None => return,
        };
        match status {
            Ok(st) if st.version != PROTOCOL_VERSION => {
                warn!(
                    worker_version = st.version,
                    manager_version = PROTOCOL_VERSION,
                    "protocol version mismatch on reconnect; destroying environment"
                );
                self.destroy_environment_forced("protocol version mismatch").await;
            }
            Ok(st) => {
                self.adopt_worker_status(st);
                let _ = self.persist();
                info!(state = %self.state, env = %self.env_state, "re-adopted surviving worker");
            }
            Err(e) => {
                warn!("worker did not answer status: {e}; destroying environment");
                self.destroy_environment_forced("worker unresponsive after manager restart").await;
            }
        }
    }

    /// Reconstruct manager state from a worker status reply:
    /// `executing_queue` if the worker is running, `paused` if paused,
    /// `idle` otherwise.
    pub(crate) fn adopt_worker_status(&mut self, st: WorkerStatusReply) {
        use runq_core::ExecState;

        self.env_state = st.env_state;
        match st.exec_state {
            ExecState::Running | ExecState::Paused => {
                self.state = if st.exec_state == ExecState::Running {
                    ManagerState::ExecutingQueue
                } else {
                    ManagerState::Paused
                };
                // Keep the persisted running item when it matches the
                // worker's view; otherwise the snapshot was lost.
                let matches = match (&self.running, &st.plan_uid) {
                    (Some(item), Some(uid)) => item.plan_uid == *uid,
                    _ => false,
                };
                if !matches {
                    if let Some(uid) = st.plan_uid {
                        warn!(%uid, "running plan not in the rehydrated snapshot");
                        self.running = Some(runq_core::PlanItem::placeholder(uid));
                    }
                }
            }
            ExecState::Idle => {
                self.state = match self.env_state {
                    EnvironmentState::Opening => ManagerState::CreatingEnvironment,
                    _ => ManagerState::Idle,
                };
                if let Some(prev) = self.running.take() {
                    // The plan finished while no manager was listening;
                    // recover its real outcome if the worker kept it.
                    match st.last_result.filter(|r| r.uid == prev.plan_uid) {
                        Some(last) => {
                            info!(uid = %last.uid, status = %last.status,
                                "recovered terminal status from worker");
                            self.history.append(runq_core::HistoryEntry {
                                item: prev,
                                status: last.status,
                                err_msg: last.err_msg,
                                finished_at_epoch_ms: self.clock.epoch_ms(),
                            });
                        }
                        None => {
                            warn!(uid = %prev.plan_uid, "terminal status lost across restart");
                            self.history.append(runq_core::HistoryEntry {
                                item: prev,
                                status: runq_core::PlanStatus::Failed,
                                err_msg: Some("result lost across manager restart".to_string()),
                                finished_at_epoch_ms: self.clock.epoch_ms(),
                            });
                        }
                    }
                }
            }
        }
    }
}
