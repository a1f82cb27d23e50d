// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the Manager<->Worker link.
//!
//! Worker notifications are forwarded into the manager control loop so
//! that client requests and worker events are serialized FIFO. Each link
//! carries a generation number; events from a link the manager has already
//! dropped are discarded by generation mismatch.

use std::path::Path;
use std::time::Duration;

use runq_core::{PauseMode, PlanItem};
use runq_wire::worker::{
    CommandAck, DevicesAllowedReply, PlansAllowedReply, WorkerCommand, WorkerNotification,
    WorkerStatusReply,
};
use runq_wire::{decode_body, CallError, Incoming, RpcPeer};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::env::WORKER_CALL_TIMEOUT;
use crate::error::ManagerError;
use crate::manager::ManagerMsg;

pub struct WorkerLink {
    peer: RpcPeer,
    pub generation: u64,
}

impl WorkerLink {
    /// Connect to the worker socket, retrying until the worker has bound
    /// it (the spawn ack races the bind), and start the event forwarder.
    pub async fn connect(
        path: &Path,
        timeout: Duration,
        generation: u64,
        msg_tx: mpsc::Sender<ManagerMsg>,
    ) -> Result<Self, ManagerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        let stream = loop {
            match UnixStream::connect(path).await {
                Ok(stream) => break stream,
                Err(e) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(ManagerError::Connect(path.to_path_buf(), e));
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            }
        };
        let (peer, incoming) = RpcPeer::spawn(stream);
        tokio::spawn(forward_events(generation, incoming, msg_tx));
        Ok(Self { peer, generation })
    }

    pub fn close(&self) {
        self.peer.close();
    }

    pub async fn run_plan(&self, item: &PlanItem) -> Result<CommandAck, CallError> {
        self.peer
            .call(&WorkerCommand::RunPlan { item: item.clone() }, WORKER_CALL_TIMEOUT)
            .await
    }

    pub async fn pause(&self, mode: PauseMode) -> Result<CommandAck, CallError> {
        self.peer.call(&WorkerCommand::Pause { mode }, WORKER_CALL_TIMEOUT).await
    }

    pub async fn resume(&self) -> Result<CommandAck, CallError> {
        self.peer.call(&WorkerCommand::Resume, WORKER_CALL_TIMEOUT).await
    }

    pub async fn stop(&self) -> Result<CommandAck, CallError> {
        self.peer.call(&WorkerCommand::Stop, WORKER_CALL_TIMEOUT).await
    }

    pub async fn abort(&self) -> Result<CommandAck, CallError> {
        self.peer.call(&WorkerCommand::Abort, WORKER_CALL_TIMEOUT).await
    }

    pub async fn halt(&self) -> Result<CommandAck, CallError> {
        self.peer.call(&WorkerCommand::Halt, WORKER_CALL_TIMEOUT).await
    }

    pub async fn status(&self) -> Result<WorkerStatusReply, CallError> {
        self.peer.call(&WorkerCommand::Status, WORKER_CALL_TIMEOUT).await
    }

    pub async fn shutdown(&self) -> Result<CommandAck, CallError> {
        self.peer.call(&WorkerCommand::Shutdown, WORKER_CALL_TIMEOUT).await
    }

    pub async fn plans_allowed(&self) -> Result<PlansAllowedReply, CallError> {
        self.peer.call(&WorkerCommand::PlansAllowedQuery, WORKER_CALL_TIMEOUT).await
    }

    pub async fn devices_allowed(&self) -> Result<DevicesAllowedReply, CallError> {
        self.peer.call(&WorkerCommand::DevicesAllowedQuery, WORKER_CALL_TIMEOUT).await
    }
}

/// Forward worker notifications into the control loop; report EOF so the
/// manager can distinguish a crash from an orderly teardown.
async fn forward_events(
    generation: u64,
    mut incoming: mpsc::Receiver<Incoming>,
    msg_tx: mpsc::Sender<ManagerMsg>,
) {
    while let Some(msg) = incoming.recv().await {
        match msg {
            Incoming::Notification { method, params } => {
                match decode_body::<WorkerNotification>(&method, params) {
                    Ok(event) => {
                        if msg_tx.send(ManagerMsg::Worker { generation, event }).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("undecodable worker notification {method}: {e}"),
                }
            }
            Incoming::Request { method, .. } => {
                debug!("ignoring unexpected request from worker: {method}");
            }
        }
    }
    let _ = msg_tx.send(ManagerMsg::WorkerGone { generation }).await;
}
