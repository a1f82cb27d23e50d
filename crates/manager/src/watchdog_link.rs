// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client side of the Watchdog<->Manager link.

use std::path::Path;
use std::time::Duration;

use runq_wire::watchdog::{
    IsWorkerAliveReply, JoinReWorkerReply, KillReWorkerReply, StartReWorkerReply,
    WatchdogNotification, WatchdogRequest, HEARTBEAT_ALIVE,
};
use runq_wire::{CallError, RpcPeer};
use tokio::net::UnixStream;
use tokio::sync::watch;
use tracing::debug;

use crate::env::{CONTROL_CALL_TIMEOUT, HEARTBEAT_PERIOD};
use crate::error::ManagerError;

/// RPC client for the watchdog. The watchdog never calls back, so the
/// inbound half of the link is drained and discarded.
#[derive(Clone)]
pub struct WatchdogLink {
    peer: RpcPeer,
}

impl WatchdogLink {
    /// Connect to the watchdog socket, retrying briefly: right after a
    /// respawn the watchdog is already listening, but the path may still
    /// be settling on first boot.
    pub async fn connect(path: &Path, timeout: Duration) -> Result<Self, ManagerError> {
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
        let (peer, mut incoming) = RpcPeer::spawn(stream);
        // Nothing is expected here; drain so the channel never backs up.
        tokio::spawn(async move { while incoming.recv().await.is_some() {} });
        Ok(Self { peer })
    }

    /// Emit `heartbeat` every 0.5 s until the kill flag is raised or the
    /// link drops. `manager_kill` raises the flag to simulate a dead
    /// manager.
    pub fn spawn_heartbeat(&self, mut killed: watch::Receiver<bool>) {
        let peer = self.peer.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(HEARTBEAT_PERIOD);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        if *killed.borrow() {
                            break;
                        }
                        let beat = WatchdogNotification::Heartbeat {
                            value: HEARTBEAT_ALIVE.to_string(),
                        };
                        if peer.notify(&beat).await.is_err() {
                            break;
                        }
                    }
                    changed = killed.changed() => {
                        if changed.is_err() || *killed.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("heartbeat emitter stopped");
        });
    }

    pub async fn start_re_worker(&self) -> Result<StartReWorkerReply, CallError> {
        self.peer.call(&WatchdogRequest::StartReWorker, CONTROL_CALL_TIMEOUT).await
    }

    pub async fn join_re_worker(&self, timeout: Duration) -> Result<JoinReWorkerReply, CallError> {
        let timeout_ms = timeout.as_millis() as u64;
        // Allow the watchdog the join window on top of the call deadline.
        self.peer
            .call(
                &WatchdogRequest::JoinReWorker { timeout_ms },
                CONTROL_CALL_TIMEOUT + timeout,
            )
            .await
    }

    pub async fn kill_re_worker(&self) -> Result<KillReWorkerReply, CallError> {
        self.peer.call(&WatchdogRequest::KillReWorker, CONTROL_CALL_TIMEOUT).await
    }

    pub async fn is_worker_alive(&self) -> Result<bool, CallError> {
        let reply: IsWorkerAliveReply =
            self.peer.call(&WatchdogRequest::IsWorkerAlive, CONTROL_CALL_TIMEOUT).await?;
        Ok(reply.worker_alive)
    }

    /// Mark this exit as intentional; the watchdog stops supervising.
    pub async fn manager_stopping(&self) {
        let _ = self.peer.notify(&WatchdogNotification::ManagerStopping).await;
    }
}
