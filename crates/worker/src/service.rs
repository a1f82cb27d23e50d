// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker service: socket endpoint, command dispatch, event routing.
//!
//! One task hosts the engine, one task reads commands from the manager
//! link; commands reach the engine through a channel. The worker accepts a
//! NEW manager connection on the same socket at any time — that is what
//! lets a restarted manager re-adopt a surviving worker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use runq_core::{EnvironmentState, ExecState, PlanStatus, PlanUid};
use runq_wire::worker::{
    CommandAck, DevicesAllowedReply, PlanResult, PlansAllowedReply, WorkerCommand,
    WorkerNotification, WorkerStatusReply,
};
use runq_wire::{decode_body, Incoming, ProtocolError, RpcError, RpcPeer, PROTOCOL_VERSION};
use serde_json::Value;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::{self, EngineControl, ExecutionParams, PlanTransition};
use crate::profile::StartupProfile;

/// How long the shutdown ack gets to reach the manager before the process
/// exits.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

const HEARTBEAT_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Socket this worker binds (the worker's end of the manager link).
    pub socket_path: PathBuf,
    /// Startup profile file; the builtin profile when absent.
    pub profile_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to bind {0}: {1}")]
    Bind(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

struct WorkerShared {
    env_state: EnvironmentState,
    env_error: Option<String>,
    profile: Option<StartupProfile>,
    exec: ExecState,
    current_uid: Option<PlanUid>,
    last_result: Option<PlanResult>,
    engine_tx: Option<mpsc::Sender<EngineControl>>,
    peer: Option<RpcPeer>,
}

type Shared = Arc<Mutex<WorkerShared>>;

/// Send a notification to the currently connected manager, if any.
async fn notify_manager(shared: &Shared, notification: WorkerNotification) {
    let peer = shared.lock().peer.clone();
    if let Some(peer) = peer {
        if let Err(e) = peer.notify(&notification).await {
            debug!("dropping notification, manager link down: {e}");
        }
    }
}

/// Run the worker service until an orderly shutdown.
pub async fn run(config: WorkerConfig) -> Result<(), WorkerError> {
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| WorkerError::Bind(config.socket_path.clone(), e))?;
    info!(socket = %config.socket_path.display(), "worker listening");

    let shared: Shared = Arc::new(Mutex::new(WorkerShared {
        env_state: EnvironmentState::Opening,
        env_error: None,
        profile: None,
        exec: ExecState::Idle,
        current_uid: None,
        last_result: None,
        engine_tx: None,
        peer: None,
    }));
    let shutdown = CancellationToken::new();
    let (status_tx, status_rx) = mpsc::channel::<PlanTransition>(16);

    tokio::spawn(load_profile(Arc::clone(&shared), config.profile_path.clone(), shutdown.clone()));
    tokio::spawn(route_transitions(Arc::clone(&shared), status_rx));
    tokio::spawn(heartbeat_loop(Arc::clone(&shared), shutdown.clone()));

    loop {
        let stream = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("accept error: {e}");
                    continue;
                }
            },
        };

        let (peer, incoming) = RpcPeer::spawn(stream);
        {
            let mut s = shared.lock();
            // A fresh manager replaces any previous link.
            if let Some(old) = s.peer.take() {
                debug!("replacing manager connection");
                old.close();
            }
            s.peer = Some(peer.clone());
        }
        catch_up(&shared, &peer).await;

        tokio::spawn(serve_connection(
            Arc::clone(&shared),
            peer,
            incoming,
            status_tx.clone(),
            shutdown.clone(),
        ));
    }

    let _ = std::fs::remove_file(&config.socket_path);
    info!("worker exiting");
    Ok(())
}

/// Replay the environment outcome to a newly connected manager so that a
/// manager that attached after the profile finished loading still learns
/// the result.
async fn catch_up(shared: &Shared, peer: &RpcPeer) {
    let (env_state, env_error) = {
        let s = shared.lock();
        (s.env_state, s.env_error.clone())
    };
    let event = match (env_state, env_error) {
        (EnvironmentState::Open, _) => Some(WorkerNotification::EnvironmentReady),
        (_, Some(err_msg)) => Some(WorkerNotification::EnvironmentFailed { err_msg }),
        _ => None,
    };
    if let Some(event) = event {
        if let Err(e) = peer.notify(&event).await {
            debug!("catch-up notification failed: {e}");
        }
    }
}

/// How long a failed worker stays up so the manager can still connect and
/// receive the failure before the process exits for joining.
const FAIL_EXIT_GRACE: Duration = Duration::from_secs(2);

async fn load_profile(shared: Shared, profile_path: Option<PathBuf>, shutdown: CancellationToken) {
    let loaded = match &profile_path {
        Some(path) => StartupProfile::load_from(path),
        None => Ok(StartupProfile::builtin()),
    };

    match loaded {
        Ok(profile) => {
            // Real startup profiles take seconds to tens of seconds to
            // load; keep the opening window observable.
            if profile.load_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(profile.load_delay_ms)).await;
            }
            info!(
                plans = profile.plans.len(),
                devices = profile.devices.len(),
                "startup profile loaded"
            );
            {
                let mut s = shared.lock();
                s.profile = Some(profile);
                s.env_state = EnvironmentState::Open;
            }
            notify_manager(&shared, WorkerNotification::EnvironmentReady).await;
        }
        Err(e) => {
            error!("startup profile failed to load: {e}");
            {
                let mut s = shared.lock();
                s.env_error = Some(e.to_string());
                s.env_state = EnvironmentState::Closed;
            }
            notify_manager(&shared, WorkerNotification::EnvironmentFailed {
                err_msg: e.to_string(),
            })
            .await;
            tokio::time::sleep(FAIL_EXIT_GRACE).await;
            shutdown.cancel();
        }
    }
}

/// Apply engine transitions to shared state, then forward them to the
/// manager. Ordering matters: a status query must never be ahead of the
/// notifications.
async fn route_transitions(shared: Shared, mut status_rx: mpsc::Receiver<PlanTransition>) {
    while let Some(t) = status_rx.recv().await {
        {
            let mut s = shared.lock();
            match t.status {
                PlanStatus::Running => s.exec = ExecState::Running,
                PlanStatus::Paused => s.exec = ExecState::Paused,
                status if status.is_terminal() => {
                    s.exec = ExecState::Idle;
                    s.current_uid = None;
                    s.engine_tx = None;
                    s.last_result = Some(PlanResult {
                        uid: t.uid.clone(),
                        status,
                        err_msg: t.err_msg.clone(),
                    });
                }
                _ => {}
            }
        }
        notify_manager(&shared, WorkerNotification::PlanStatus {
            uid: t.uid,
            status: t.status,
            err_msg: t.err_msg,
        })
        .await;
    }
}

async fn heartbeat_loop(shared: Shared, shutdown: CancellationToken) {
    let mut tick = tokio::time::interval(HEARTBEAT_PERIOD);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tick.tick() => {
                notify_manager(&shared, WorkerNotification::HeartbeatWorker {
                    value: "alive".to_string(),
                })
                .await;
            }
        }
    }
}

async fn serve_connection(
    shared: Shared,
    peer: RpcPeer,
    mut incoming: mpsc::Receiver<Incoming>,
    status_tx: mpsc::Sender<PlanTransition>,
    shutdown: CancellationToken,
) {
    while let Some(msg) = incoming.recv().await {
        match msg {
            Incoming::Request { id, method, params, .. } => {
                let reply = match decode_body::<WorkerCommand>(&method, params) {
                    Ok(cmd) => handle_command(&shared, cmd, &status_tx, &shutdown).await,
                    Err(e) => Err(e),
                };
                let result = match reply {
                    Ok(value) => peer.reply_ok(id, &value).await,
                    Err(e) => peer.reply_err(id, e).await,
                };
                if result.is_err() {
                    break;
                }
            }
            Incoming::Notification { method, .. } => {
                debug!("ignoring unexpected notification from manager: {method}");
            }
        }
    }
    debug!("manager connection closed");
}

fn ack(ack: CommandAck) -> Result<Value, RpcError> {
    serde_json::to_value(ack).map_err(RpcError::internal)
}

async fn handle_command(
    shared: &Shared,
    cmd: WorkerCommand,
    status_tx: &mpsc::Sender<PlanTransition>,
    shutdown: &CancellationToken,
) -> Result<Value, RpcError> {
    match cmd {
        WorkerCommand::Status => {
            let s = shared.lock();
            let reply = WorkerStatusReply {
                env_state: s.env_state,
                plan_uid: s.current_uid.clone(),
                exec_state: s.exec,
                last_result: s.last_result.clone(),
                version: PROTOCOL_VERSION,
            };
            serde_json::to_value(reply).map_err(RpcError::internal)
        }

        WorkerCommand::RunPlan { item } => {
            let spawn = {
                let mut s = shared.lock();
                if s.env_state != EnvironmentState::Open {
                    return ack(CommandAck::err("environment is not open"));
                }
                if s.exec != ExecState::Idle {
                    return ack(CommandAck::err("another plan is running"));
                }
                let Some(profile) = s.profile.as_ref() else {
                    return ack(CommandAck::err("environment is not open"));
                };
                let Some(def) = profile.find_plan(&item.name) else {
                    return ack(CommandAck::err(format!("unknown plan '{}'", item.name)));
                };
                let params = ExecutionParams::resolve(&item, def);
                let (control_tx, control_rx) = mpsc::channel(8);
                s.engine_tx = Some(control_tx);
                s.exec = ExecState::Running;
                s.current_uid = Some(item.plan_uid.clone());
                (params, control_rx)
            };
            let (params, control_rx) = spawn;
            tokio::spawn(engine::run_plan(item, params, control_rx, status_tx.clone()));
            ack(CommandAck::ok())
        }

        WorkerCommand::Pause { mode } => {
            send_control(shared, EngineControl::Pause(mode)).await
        }
        WorkerCommand::Resume => send_control(shared, EngineControl::Resume).await,
        WorkerCommand::Stop => send_control(shared, EngineControl::Stop).await,
        WorkerCommand::Abort => send_control(shared, EngineControl::Abort).await,
        WorkerCommand::Halt => send_control(shared, EngineControl::Halt).await,

        WorkerCommand::Shutdown => {
            {
                let mut s = shared.lock();
                if s.exec != ExecState::Idle {
                    return ack(CommandAck::err("a plan is running"));
                }
                s.env_state = EnvironmentState::Closing;
            }
            info!("shutdown requested, draining");
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep(SHUTDOWN_GRACE).await;
                shutdown.cancel();
            });
            ack(CommandAck::ok())
        }

        WorkerCommand::PlansAllowedQuery => {
            let plans_allowed = shared
                .lock()
                .profile
                .as_ref()
                .map(StartupProfile::plan_names)
                .unwrap_or_default();
            serde_json::to_value(PlansAllowedReply { plans_allowed }).map_err(RpcError::internal)
        }

        WorkerCommand::DevicesAllowedQuery => {
            let devices_allowed =
                shared.lock().profile.as_ref().map(|p| p.devices.clone()).unwrap_or_default();
            serde_json::to_value(DevicesAllowedReply { devices_allowed })
                .map_err(RpcError::internal)
        }
    }
}

async fn send_control(shared: &Shared, control: EngineControl) -> Result<Value, RpcError> {
    let engine_tx = shared.lock().engine_tx.clone();
    match engine_tx {
        Some(tx) => {
            if tx.send(control).await.is_err() {
                warn!("engine control channel closed mid-command");
                return ack(CommandAck::err("no plan is running"));
            }
            ack(CommandAck::ok())
        }
        None => ack(CommandAck::err("no plan is running")),
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
