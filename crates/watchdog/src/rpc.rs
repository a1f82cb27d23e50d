// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC receiver for the Watchdog<->Manager link.

use std::sync::Arc;
use std::time::Duration;

use runq_core::Clock;
use runq_wire::watchdog::{
    IsWorkerAliveReply, JoinReWorkerReply, KillReWorkerReply, StartReWorkerReply,
    WatchdogNotification, WatchdogRequest, HEARTBEAT_ALIVE,
};
use runq_wire::{decode_body, Incoming, RpcError, RpcPeer};
use serde_json::Value;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::env::WatchdogConfig;
use crate::supervisor::Shared;

/// Serve one manager connection until it drops. A restarted manager shows
/// up as a fresh connection on the same listener.
pub async fn serve_link<C: Clock>(
    shared: Arc<Shared<C>>,
    peer: RpcPeer,
    mut incoming: mpsc::Receiver<Incoming>,
) {
    while let Some(msg) = incoming.recv().await {
        match msg {
            Incoming::Request { id, method, params, .. } => {
                let outcome = match decode_body::<WatchdogRequest>(&method, params) {
                    Ok(req) => handle_request(&shared, req).await,
                    Err(e) => Err(e),
                };
                let sent = match outcome {
                    Ok(value) => peer.reply_ok(id, &value).await,
                    Err(e) => peer.reply_err(id, e).await,
                };
                if sent.is_err() {
                    break;
                }
            }
            Incoming::Notification { method, params } => {
                match decode_body::<WatchdogNotification>(&method, params) {
                    Ok(notification) => handle_notification(&shared, notification),
                    Err(e) => warn!("undecodable notification {method}: {e}"),
                }
            }
        }
    }
    debug!("manager link closed");
}

pub(crate) fn handle_notification<C: Clock>(
    shared: &Shared<C>,
    notification: WatchdogNotification,
) {
    match notification {
        WatchdogNotification::ManagerStopping => {
            info!("manager announced an intentional stop");
            shared.set_manager_stopping();
        }
        WatchdogNotification::Heartbeat { value } => {
            if value == HEARTBEAT_ALIVE {
                shared.reset_heartbeat();
            }
        }
    }
}

pub(crate) async fn handle_request<C: Clock>(
    shared: &Shared<C>,
    req: WatchdogRequest,
) -> Result<Value, RpcError> {
    match req {
        WatchdogRequest::StartReWorker => {
            let mut guard = shared.worker.lock().await;
            let already_running = match guard.as_mut() {
                Some(child) => matches!(child.try_wait(), Ok(None)),
                None => false,
            };
            if already_running {
                return to_value(StartReWorkerReply {
                    success: false,
                    err_msg: "worker already exists".to_string(),
                });
            }
            *guard = None;
            info!("starting worker");
            match spawn_worker(&shared.cfg) {
                Ok(child) => {
                    *guard = Some(child);
                    to_value(StartReWorkerReply { success: true, err_msg: String::new() })
                }
                Err(e) => to_value(StartReWorkerReply { success: false, err_msg: e.to_string() }),
            }
        }

        WatchdogRequest::JoinReWorker { timeout_ms } => {
            let mut guard = shared.worker.lock().await;
            let success = match guard.as_mut() {
                None => true,
                Some(child) => {
                    match tokio::time::timeout(Duration::from_millis(timeout_ms), child.wait())
                        .await
                    {
                        Ok(_) => true,
                        Err(_) => false,
                    }
                }
            };
            if success {
                info!("worker joined");
                *guard = None;
            }
            to_value(JoinReWorkerReply { success })
        }

        WatchdogRequest::KillReWorker => {
            let mut guard = shared.worker.lock().await;
            if let Some(mut child) = guard.take() {
                info!("killing worker");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
            to_value(KillReWorkerReply { success: true })
        }

        WatchdogRequest::IsWorkerAlive => {
            let mut guard = shared.worker.lock().await;
            let worker_alive = match guard.as_mut() {
                Some(child) => matches!(child.try_wait(), Ok(None)),
                None => false,
            };
            to_value(IsWorkerAliveReply { worker_alive })
        }
    }
}

/// Spawn the worker with its end of the Manager<->Worker endpoint. Quick:
/// never waits for the startup profile to load.
fn spawn_worker(cfg: &WatchdogConfig) -> std::io::Result<Child> {
    let mut command = Command::new(&cfg.worker_bin);
    command
        .env("RUNQ_STATE_DIR", &cfg.state_dir)
        .env("RUNQ_WORKER_SOCK", &cfg.worker_sock);
    if let Some(profile) = &cfg.profile_path {
        command.env("RUNQ_PROFILE", profile);
    }
    command.spawn()
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(RpcError::internal)
}
