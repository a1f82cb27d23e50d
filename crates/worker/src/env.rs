// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable access for the worker process. The watchdog sets
//! these when it spawns the worker.

use std::path::PathBuf;

use thiserror::Error;

use crate::service::WorkerConfig;

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("RUNQ_WORKER_SOCK is not set")]
    NoSocket,
}

/// Build the worker configuration from the environment.
pub fn worker_config() -> Result<WorkerConfig, EnvError> {
    let socket_path =
        std::env::var_os("RUNQ_WORKER_SOCK").map(PathBuf::from).ok_or(EnvError::NoSocket)?;
    let profile_path = std::env::var_os("RUNQ_PROFILE").map(PathBuf::from);
    Ok(WorkerConfig { socket_path, profile_path })
}

/// Directory for the worker's log file, when a state dir is configured.
pub fn log_dir() -> Option<PathBuf> {
    std::env::var_os("RUNQ_STATE_DIR").map(|d| PathBuf::from(d).join("logs"))
}
