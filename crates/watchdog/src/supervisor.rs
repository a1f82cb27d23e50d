// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The supervision loop: spawn the manager, watch its heartbeat, restart
//! it inside the timeout window, exit when it stops intentionally.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use parking_lot::Mutex;
use runq_core::{Clock, SystemClock};
use runq_wire::RpcPeer;
use std::io::Write;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

use crate::env::WatchdogConfig;
use crate::rpc;

/// Heartbeat gap that marks the manager as malfunctioning.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound of the restart window. A gap beyond this is treated as a
/// clock anomaly, not a dead manager.
pub const HEARTBEAT_WINDOW_MAX: Duration = Duration::from_secs(15);

/// Supervision poll granularity.
pub const SUPERVISION_TICK: Duration = Duration::from_millis(100);

/// The restart policy: a heartbeat gap inside the window, with no
/// intentional stop in progress.
pub fn restart_due(gap: Duration, manager_stopping: bool) -> bool {
    gap > HEARTBEAT_TIMEOUT && gap < HEARTBEAT_WINDOW_MAX && !manager_stopping
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: watchdog already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("failed to spawn manager {0}: {1}")]
    SpawnManager(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// State shared between the supervision loop and the RPC receiver.
pub struct Shared<C: Clock> {
    pub cfg: WatchdogConfig,
    pub clock: C,
    /// Timestamp of the most recent heartbeat, under a mutex. Monotonic.
    heartbeat: Mutex<Instant>,
    /// Set by the `manager_stopping` notification; disables auto-restart.
    manager_stopping: AtomicBool,
    /// The worker child. The watchdog owns the OS handle so the worker
    /// survives manager restarts.
    pub(crate) worker: tokio::sync::Mutex<Option<Child>>,
}

impl<C: Clock> Shared<C> {
    pub fn new(cfg: WatchdogConfig, clock: C) -> Self {
        let now = clock.now();
        Self {
            cfg,
            clock,
            heartbeat: Mutex::new(now),
            manager_stopping: AtomicBool::new(false),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn reset_heartbeat(&self) {
        *self.heartbeat.lock() = self.clock.now();
    }

    pub fn heartbeat_gap(&self) -> Duration {
        self.clock.now().saturating_duration_since(*self.heartbeat.lock())
    }

    pub fn set_manager_stopping(&self) {
        self.manager_stopping.store(true, Ordering::SeqCst);
    }

    pub fn manager_stopping(&self) -> bool {
        self.manager_stopping.load(Ordering::SeqCst)
    }
}

pub struct Supervisor<C: Clock = SystemClock> {
    shared: Arc<Shared<C>>,
}

impl Supervisor<SystemClock> {
    pub fn new(cfg: WatchdogConfig) -> Self {
        Self::with_clock(cfg, SystemClock)
    }
}

impl<C: Clock> Supervisor<C> {
    pub fn with_clock(cfg: WatchdogConfig, clock: C) -> Self {
        Self { shared: Arc::new(Shared::new(cfg, clock)) }
    }

    /// Run until the manager exits intentionally.
    pub async fn run(self) -> Result<(), SupervisorError> {
        let cfg = self.shared.cfg.clone();

        std::fs::create_dir_all(&cfg.run_dir)?;

        // Acquire the lock file first. Open without truncating so a
        // failed attempt doesn't wipe the running watchdog's PID.
        let lock_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&cfg.lock_path)?;
        lock_file.try_lock_exclusive().map_err(SupervisorError::LockFailed)?;
        let mut lock_file = lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;

        // Stale endpoints from a previous run would shadow the new ones.
        for sock in [&cfg.watchdog_sock, &cfg.worker_sock, &cfg.control_sock] {
            if sock.exists() {
                std::fs::remove_file(sock)?;
            }
        }

        let listener = UnixListener::bind(&cfg.watchdog_sock)
            .map_err(|e| SupervisorError::BindFailed(cfg.watchdog_sock.clone(), e))?;
        info!(socket = %cfg.watchdog_sock.display(), "watchdog listening");

        let shared = Arc::clone(&self.shared);
        tokio::spawn(accept_loop(listener, shared));

        let mut manager = spawn_manager(&self.shared.cfg)?;
        self.shared.reset_heartbeat();

        let mut tick = tokio::time::interval(SUPERVISION_TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;

            let manager_alive = manager.try_wait()?.is_none();
            if self.shared.manager_stopping() && !manager_alive {
                info!("manager stopped intentionally; watchdog exiting");
                break;
            }

            let gap = self.shared.heartbeat_gap();
            if restart_due(gap, self.shared.manager_stopping()) {
                error!(
                    gap_ms = gap.as_millis() as u64,
                    "heartbeat timeout: manager malfunctioned and must be restarted"
                );
                let _ = manager.start_kill();
                let _ = manager.wait().await;
                manager = spawn_manager(&self.shared.cfg)?;
                self.shared.reset_heartbeat();
            }
        }

        // Orderly exit: the manager already tore the environment down.
        let _ = std::fs::remove_file(&cfg.watchdog_sock);
        let _ = std::fs::remove_file(&cfg.lock_path);
        Ok(())
    }
}

/// Spawn (or re-spawn) the manager with the same endpoints. The worker is
/// deliberately untouched.
fn spawn_manager(cfg: &WatchdogConfig) -> Result<Child, SupervisorError> {
    info!(bin = %cfg.manager_bin.display(), "starting manager");
    let mut command = Command::new(&cfg.manager_bin);
    command
        .env("RUNQ_STATE_DIR", &cfg.state_dir)
        .env("RUNQ_WATCHDOG_SOCK", &cfg.watchdog_sock)
        .env("RUNQ_WORKER_SOCK", &cfg.worker_sock)
        .env("RUNQ_CONTROL_SOCK", &cfg.control_sock);
    command.spawn().map_err(|e| SupervisorError::SpawnManager(cfg.manager_bin.clone(), e))
}

async fn accept_loop<C: Clock>(listener: UnixListener, shared: Arc<Shared<C>>) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let (peer, incoming) = RpcPeer::spawn(stream);
                tokio::spawn(rpc::serve_link(Arc::clone(&shared), peer, incoming));
            }
            Err(e) => {
                warn!("watchdog accept error: {e}");
                return;
            }
        }
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
