// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for manager restarts.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use runq_core::{EnvironmentState, HistoryEntry, PlanItem};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported snapshot version {0}")]
    Version(u32),
}

/// The complete persisted manager state at a point in time.
///
/// One snapshot file holds what the manager needs to survive a restart:
/// the queue, the history, the running slot, and the environment state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Schema version for migrations
    #[serde(rename = "v")]
    pub version: u32,
    /// Queue contents, front first
    pub queue: Vec<PlanItem>,
    /// Completed plan attempts
    pub history: Vec<HistoryEntry>,
    /// The plan currently in the running slot, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running: Option<PlanItem>,
    /// Environment state at save time
    pub env_state: EnvironmentState,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

impl QueueSnapshot {
    pub fn new(
        queue: Vec<PlanItem>,
        history: Vec<HistoryEntry>,
        running: Option<PlanItem>,
        env_state: EnvironmentState,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            queue,
            history,
            running,
            env_state,
            created_at: Utc::now(),
        }
    }

    pub fn empty() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            queue: Vec::new(),
            history: Vec::new(),
            running: None,
            env_state: EnvironmentState::Closed,
            created_at: Utc::now(),
        }
    }
}

/// File-backed snapshot store. Saves go to a temp file and land with an
/// atomic rename, so readers never observe a torn snapshot.
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
}

impl QueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Persist a snapshot. Synchronous: when this returns Ok the snapshot
    /// is on disk under its final name.
    pub fn save(&self, snapshot: &QueueSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!(
            queue = snapshot.queue.len(),
            history = snapshot.history.len(),
            "saved queue snapshot"
        );
        Ok(())
    }

    /// Load the snapshot, or `None` if no snapshot exists yet.
    pub fn load(&self) -> Result<Option<QueueSnapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let snapshot: QueueSnapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::Version(snapshot.version));
        }
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
