// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("failed to connect to {0}: {1}")]
    Connect(PathBuf, std::io::Error),

    #[error("failed to bind {0}: {1}")]
    Bind(PathBuf, std::io::Error),

    #[error("watchdog call failed: {0}")]
    Watchdog(#[from] runq_wire::CallError),

    #[error("store error: {0}")]
    Store(#[from] runq_storage::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
