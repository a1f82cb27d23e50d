// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manager bootstrap: rehydrate persisted state, attach to the watchdog,
//! re-adopt a surviving worker, bind the control channel.

use std::time::Duration;

use runq_core::SystemClock;
use runq_storage::QueueStore;
use tokio::net::UnixListener;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::env::ManagerConfig;
use crate::error::ManagerError;
use crate::listener::ControlListener;
use crate::manager::{Manager, ManagerMsg};
use crate::watchdog_link::WatchdogLink;

/// How long to keep retrying the watchdog socket at boot.
const WATCHDOG_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Bootstrap {
    pub manager: Manager<SystemClock>,
    pub msg_rx: mpsc::Receiver<ManagerMsg>,
    pub listener: ControlListener,
}

pub async fn startup(cfg: ManagerConfig) -> Result<Bootstrap, ManagerError> {
    // 1. Rehydrate the queue from the persistent store; a broken or
    // missing store means an empty queue, not a failed start.
    let store = QueueStore::new(&cfg.snapshot_path);
    let snapshot = match store.load() {
        Ok(Some(snap)) => {
            info!(
                queue = snap.queue.len(),
                history = snap.history.len(),
                running = snap.running.is_some(),
                "rehydrated queue snapshot"
            );
            Some(snap)
        }
        Ok(None) => {
            info!("no queue snapshot; starting empty");
            None
        }
        Err(e) => {
            warn!("queue store unavailable, starting with an empty queue: {e}");
            None
        }
    };

    // 2. Attach to the watchdog and start heartbeating immediately so the
    // supervision window never sees a silent-but-alive manager.
    let watchdog = WatchdogLink::connect(&cfg.watchdog_sock, WATCHDOG_CONNECT_TIMEOUT).await?;
    let (kill_tx, kill_rx) = watch::channel(false);
    watchdog.spawn_heartbeat(kill_rx);

    let (msg_tx, msg_rx) = mpsc::channel(256);
    let mut manager = Manager::new(
        cfg.clone(),
        SystemClock,
        snapshot,
        store,
        watchdog,
        msg_tx.clone(),
        kill_tx,
    );

    // 3. Re-adopt a surviving worker (or settle the environment as
    // closed) BEFORE serving clients, so the first status reply is
    // already consistent.
    manager.resync_with_worker().await;

    // 4. Bind the control channel last.
    if cfg.control_sock.exists() {
        std::fs::remove_file(&cfg.control_sock)?;
    }
    if let Some(parent) = cfg.control_sock.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = UnixListener::bind(&cfg.control_sock)
        .map_err(|e| ManagerError::Bind(cfg.control_sock.clone(), e))?;
    info!(socket = %cfg.control_sock.display(), "control channel listening");

    Ok(Bootstrap { manager, msg_rx, listener: ControlListener::new(listener, msg_tx) })
}
