// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control channel client: connect, send one request, await the reply.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use runq_wire::control::{ControlReply, ControlRequest};
use runq_wire::{CallError, RpcPeer};
use tokio::net::UnixStream;

/// Resolve the control socket: explicit flag > RUNQ_CONTROL_SOCK > the
/// state directory's default endpoint.
pub fn control_socket(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os("RUNQ_CONTROL_SOCK") {
        return Ok(PathBuf::from(path));
    }
    let state_dir = if let Some(dir) = std::env::var_os("RUNQ_STATE_DIR") {
        PathBuf::from(dir)
    } else if let Some(xdg) = std::env::var_os("XDG_STATE_HOME") {
        PathBuf::from(xdg).join("runq")
    } else {
        let home = std::env::var_os("HOME")
            .ok_or_else(|| anyhow!("could not determine the state directory"))?;
        PathBuf::from(home).join(".local/state/runq")
    };
    Ok(state_dir.join("run/control.sock"))
}

/// The failure modes that matter for exit codes.
pub enum SendError {
    /// The manager did not answer inside the deadline (e.g. after
    /// `manager_kill`).
    Timeout,
    /// Everything else: unreachable socket, protocol error.
    Other(anyhow::Error),
}

/// Send one request with a fresh client-generated request UID.
pub async fn send(
    socket: &Path,
    req: &ControlRequest,
    deadline: Duration,
) -> std::result::Result<ControlReply, SendError> {
    let stream = UnixStream::connect(socket).await.map_err(|e| {
        SendError::Other(
            anyhow!(e).context(format!("cannot reach the manager at {}", socket.display())),
        )
    })?;
    let (peer, _incoming) = RpcPeer::spawn(stream);
    let request_uid = uuid::Uuid::new_v4().simple().to_string();
    peer.call_with_request_uid(req, Some(request_uid), deadline).await.map_err(|e| match e {
        CallError::Timeout(_) => SendError::Timeout,
        other => SendError::Other(anyhow!(other).context("request failed")),
    })
}

/// Parse a `--args` JSON array.
pub fn parse_args(text: Option<&str>) -> Result<Vec<serde_json::Value>> {
    match text {
        None => Ok(Vec::new()),
        Some(text) => serde_json::from_str::<Vec<serde_json::Value>>(text)
            .context("--args must be a JSON array"),
    }
}

/// Parse a `--kwargs` JSON object into an ordered map.
pub fn parse_kwargs(
    text: Option<&str>,
) -> Result<indexmap::IndexMap<String, serde_json::Value>> {
    match text {
        None => Ok(indexmap::IndexMap::new()),
        Some(text) => serde_json::from_str(text).context("--kwargs must be a JSON object"),
    }
}
