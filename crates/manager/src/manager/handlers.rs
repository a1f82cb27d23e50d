// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client command handlers: queue edits, queries, pause continuations,
//! manager lifecycle.

use runq_core::{
    Clock, EnvironmentState, ItemRef, ManagerState, MoveDestination, PauseMode, PlanSpec, PlanUid,
    QueuePosition,
};
use runq_wire::control::{ControlReply, StopOption};
use runq_wire::CallError;
use serde_json::json;
use tracing::info;

use super::Manager;

enum ContinuationKind {
    Stop,
    Abort,
    Halt,
}

fn ack_to_reply(result: Result<runq_wire::worker::CommandAck, CallError>) -> ControlReply {
    match result {
        Ok(ack) if ack.success => ControlReply::ok(),
        Ok(ack) => ControlReply::err(ack.msg),
        Err(e) => ControlReply::err(e.to_string()),
    }
}

impl<C: Clock> Manager<C> {
    pub(crate) fn handle_ping(&self) -> ControlReply {
        ControlReply::ok()
            .with("msg", json!("runq manager"))
            .with("manager_state", json!(self.state))
    }

    pub(crate) fn handle_status(&self) -> ControlReply {
        let mut reply = ControlReply::ok()
            .with("manager_state", json!(self.state))
            .with("env_state", json!(self.env_state))
            .with("items_in_queue", json!(self.queue.len()))
            .with("items_in_history", json!(self.history.len()))
            .with(
                "running_item_uid",
                json!(self.running.as_ref().map(|item| item.plan_uid.clone())),
            )
            .with("queue_stop_pending", json!(self.queue_stop_pending));
        if let Some(ms) = self.last_worker_heartbeat_ms {
            reply = reply.with("worker_heartbeat_at_ms", json!(ms));
        }
        if let Some(err) = &self.last_env_error {
            reply = reply.with("last_env_error", json!(err));
        }
        reply
    }

    pub(crate) fn handle_queue_item_add(
        &mut self,
        spec: PlanSpec,
        pos: Option<QueuePosition>,
    ) -> ControlReply {
        if spec.name.trim().is_empty() {
            return ControlReply::err("plan name must not be empty");
        }
        let item = spec.into_item(PlanUid::new(), self.clock.epoch_ms());
        let pos = pos.unwrap_or_default();
        match self.queue.insert(item.clone(), &pos) {
            Ok(idx) => {
                if let Err(e) = self.persist() {
                    // Roll the insert back so memory and disk agree.
                    let _ = self.queue.remove(Some(&ItemRef::Uid(item.plan_uid.clone())));
                    return ControlReply::err(format!("failed to persist queue: {e}"));
                }
                info!(uid = %item.plan_uid, plan = %item.name, pos = idx, "queue item added");
                ControlReply::ok()
                    .with("item", json!(item))
                    .with("pos", json!(idx))
                    .with("qsize", json!(self.queue.len()))
            }
            Err(e) => ControlReply::err(e.to_string()),
        }
    }

    pub(crate) fn handle_queue_item_get(&self, item: Option<ItemRef>) -> ControlReply {
        match self.queue.get(item.as_ref()) {
            Ok(found) => ControlReply::ok().with("item", json!(found)),
            Err(e) => ControlReply::err(e.to_string()),
        }
    }

    pub(crate) fn handle_queue_plan_remove(&mut self, item: Option<ItemRef>) -> ControlReply {
        let before = self.queue.clone();
        match self.queue.remove(item.as_ref()) {
            Ok(removed) => {
                if let Err(e) = self.persist() {
                    self.queue = before;
                    return ControlReply::err(format!("failed to persist queue: {e}"));
                }
                info!(uid = %removed.plan_uid, "queue item removed");
                ControlReply::ok()
                    .with("item", json!(removed))
                    .with("qsize", json!(self.queue.len()))
            }
            Err(e) => ControlReply::err(e.to_string()),
        }
    }

    pub(crate) fn handle_queue_plan_move(
        &mut self,
        src: ItemRef,
        dst: MoveDestination,
    ) -> ControlReply {
        let before = self.queue.clone();
        match self.queue.move_item(&src, &dst) {
            Ok((moved, idx)) => {
                if let Err(e) = self.persist() {
                    self.queue = before;
                    return ControlReply::err(format!("failed to persist queue: {e}"));
                }
                ControlReply::ok().with("item", json!(moved)).with("pos", json!(idx))
            }
            Err(e) => ControlReply::err(e.to_string()),
        }
    }

    pub(crate) fn handle_queue_get(&self) -> ControlReply {
        ControlReply::ok()
            .with("items", json!(self.queue.snapshot()))
            .with("running_item", json!(self.running))
    }

    pub(crate) fn handle_queue_clear(&mut self) -> ControlReply {
        let before = self.queue.clone();
        self.queue.clear();
        if let Err(e) = self.persist() {
            self.queue = before;
            return ControlReply::err(format!("failed to persist queue: {e}"));
        }
        info!("queue cleared");
        ControlReply::ok()
    }

    pub(crate) fn handle_queue_stop(&mut self) -> ControlReply {
        if !matches!(self.state, ManagerState::ExecutingQueue | ManagerState::Paused) {
            return ControlReply::err("queue is not running");
        }
        self.queue_stop_pending = true;
        info!("queue stop pending: execution halts after the current plan");
        ControlReply::ok()
    }

    pub(crate) fn handle_queue_stop_cancel(&mut self) -> ControlReply {
        self.queue_stop_pending = false;
        ControlReply::ok()
    }

    pub(crate) async fn handle_re_pause(&mut self, mode: PauseMode) -> ControlReply {
        if self.state != ManagerState::ExecutingQueue {
            return ControlReply::err(format!(
                "cannot pause: manager state is '{}'",
                self.state
            ));
        }
        let Some(worker) = self.worker.as_ref() else {
            return ControlReply::err("environment is not open");
        };
        ack_to_reply(worker.pause(mode).await)
    }

    pub(crate) async fn handle_re_resume(&mut self) -> ControlReply {
        if self.state != ManagerState::Paused {
            return ControlReply::err("nothing is paused");
        }
        let Some(worker) = self.worker.as_ref() else {
            return ControlReply::err("environment is not open");
        };
        let result = worker.resume().await;
        if matches!(&result, Ok(ack) if ack.success) {
            self.state = ManagerState::ExecutingQueue;
        }
        ack_to_reply(result)
    }

    pub(crate) async fn handle_re_stop(&mut self) -> ControlReply {
        self.continuation(ContinuationKind::Stop).await
    }

    pub(crate) async fn handle_re_abort(&mut self) -> ControlReply {
        self.continuation(ContinuationKind::Abort).await
    }

    pub(crate) async fn handle_re_halt(&mut self) -> ControlReply {
        self.continuation(ContinuationKind::Halt).await
    }

    /// Shared gate for stop/abort/halt: only valid from pause. The state
    /// transition happens when the terminal plan_status event arrives.
    async fn continuation(&mut self, kind: ContinuationKind) -> ControlReply {
        if self.state != ManagerState::Paused {
            return ControlReply::err("nothing is paused");
        }
        let Some(worker) = self.worker.as_ref() else {
            return ControlReply::err("environment is not open");
        };
        let result = match kind {
            ContinuationKind::Stop => worker.stop().await,
            ContinuationKind::Abort => worker.abort().await,
            ContinuationKind::Halt => worker.halt().await,
        };
        ack_to_reply(result)
    }

    pub(crate) fn handle_history_get(&self) -> ControlReply {
        ControlReply::ok().with("items", json!(self.history.snapshot()))
    }

    pub(crate) fn handle_history_clear(&mut self) -> ControlReply {
        let before = self.history.clone();
        self.history.clear();
        if let Err(e) = self.persist() {
            self.history = before;
            return ControlReply::err(format!("failed to persist history: {e}"));
        }
        ControlReply::ok()
    }

    pub(crate) async fn handle_plans_allowed(&self) -> ControlReply {
        if self.env_state != EnvironmentState::Open {
            return ControlReply::err("environment is not open");
        }
        let Some(worker) = self.worker.as_ref() else {
            return ControlReply::err("environment is not open");
        };
        match worker.plans_allowed().await {
            Ok(reply) => ControlReply::ok().with("plans_allowed", json!(reply.plans_allowed)),
            Err(e) => ControlReply::err(e.to_string()),
        }
    }

    pub(crate) async fn handle_devices_allowed(&self) -> ControlReply {
        if self.env_state != EnvironmentState::Open {
            return ControlReply::err("environment is not open");
        }
        let Some(worker) = self.worker.as_ref() else {
            return ControlReply::err("environment is not open");
        };
        match worker.devices_allowed().await {
            Ok(reply) => {
                ControlReply::ok().with("devices_allowed", json!(reply.devices_allowed))
            }
            Err(e) => ControlReply::err(e.to_string()),
        }
    }

    pub(crate) async fn handle_manager_stop(&mut self, option: StopOption) -> ControlReply {
        if option == StopOption::SafeOn && self.running.is_some() {
            return ControlReply::err(
                "a plan is running; wait for it, pause, or use the safe_off option",
            );
        }
        if self.env_state != EnvironmentState::Closed {
            if self.state == ManagerState::Idle && self.env_state == EnvironmentState::Open {
                let reply = self.handle_environment_close().await;
                if !reply.success {
                    self.destroy_environment_forced("manager stopping").await;
                }
            } else {
                self.destroy_environment_forced("manager stopping").await;
            }
        }
        self.watchdog.manager_stopping().await;
        self.stopping = true;
        info!("manager stop accepted");
        ControlReply::ok()
    }
}
