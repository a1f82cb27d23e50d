// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RPC peer: one reader task and one writer task per endpoint.
//!
//! The writer task is the only place that writes to the stream, so no two
//! messages interleave. The reader task completes pending calls on reply
//! frames and forwards requests/notifications to the host's dispatch loop
//! through the inbound channel. When the link drops, all outstanding calls
//! fail with [`CallError::Disconnected`] and the inbound channel closes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::envelope::{Frame, FrameKind, RpcError};
use crate::framing::{decode, encode, read_message, write_message, ProtocolError};

/// An incoming message that needs host-side dispatch.
#[derive(Debug)]
pub enum Incoming {
    Request { id: u64, method: String, params: Option<Value>, request_uid: Option<String> },
    Notification { method: String, params: Option<Value> },
}

#[derive(Debug, Error)]
pub enum CallError {
    #[error("peer disconnected")]
    Disconnected,

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>;

/// Handle to one end of an RPC link. Cheap to clone; all clones share the
/// writer, the pending-reply map, and the id counter.
#[derive(Clone)]
pub struct RpcPeer {
    out_tx: mpsc::Sender<Frame>,
    /// `None` once the link has dropped; new calls fail fast.
    pending: Arc<Mutex<Option<PendingMap>>>,
    next_id: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl RpcPeer {
    /// Take ownership of a connected stream and spawn the reader/writer
    /// tasks. Returns the peer handle and the inbound message channel.
    pub fn spawn(stream: UnixStream) -> (Self, mpsc::Receiver<Incoming>) {
        let (read_half, write_half) = stream.into_split();
        let (out_tx, out_rx) = mpsc::channel(64);
        let (in_tx, in_rx) = mpsc::channel(64);
        let pending: Arc<Mutex<Option<PendingMap>>> = Arc::new(Mutex::new(Some(HashMap::new())));
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(write_half, out_rx, cancel.clone()));
        tokio::spawn(read_loop(read_half, in_tx, Arc::clone(&pending), cancel.clone()));

        let peer = Self { out_tx, pending, next_id: Arc::new(AtomicU64::new(1)), cancel };
        (peer, in_rx)
    }

    /// Send a request and await its reply, decoded into `Resp`.
    pub async fn call<Req, Resp>(&self, body: &Req, deadline: Duration) -> Result<Resp, CallError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        self.call_with_request_uid(body, None, deadline).await
    }

    /// Like [`call`](Self::call), carrying a client-generated request UID
    /// in the envelope (control channel duplicate detection).
    pub async fn call_with_request_uid<Req, Resp>(
        &self,
        body: &Req,
        request_uid: Option<String>,
        deadline: Duration,
    ) -> Result<Resp, CallError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut frame = Frame::request(id, body)?;
        frame.request_uid = request_uid;
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.pending.lock();
            match guard.as_mut() {
                Some(map) => {
                    map.insert(id, tx);
                }
                None => return Err(CallError::Disconnected),
            }
        }

        if self.out_tx.send(frame).await.is_err() {
            self.forget(id);
            return Err(CallError::Disconnected);
        }

        match tokio::time::timeout(deadline, rx).await {
            Err(_) => {
                self.forget(id);
                Err(CallError::Timeout(deadline))
            }
            Ok(Err(_)) => Err(CallError::Disconnected),
            Ok(Ok(Err(rpc_err))) => Err(CallError::Rpc(rpc_err)),
            Ok(Ok(Ok(value))) => Ok(serde_json::from_value(value)?),
        }
    }

    /// Send a notification (no reply expected).
    pub async fn notify<Req: Serialize>(&self, body: &Req) -> Result<(), CallError> {
        let frame = Frame::notification(body)?;
        self.out_tx.send(frame).await.map_err(|_| CallError::Disconnected)
    }

    /// Answer an incoming request.
    pub async fn reply_ok<T: Serialize>(&self, id: u64, result: &T) -> Result<(), CallError> {
        let frame = Frame::reply_ok(id, result)?;
        self.out_tx.send(frame).await.map_err(|_| CallError::Disconnected)
    }

    /// Answer an incoming request with an echoed control request UID.
    pub async fn reply_ok_with_uid<T: Serialize>(
        &self,
        id: u64,
        result: &T,
        request_uid: Option<String>,
    ) -> Result<(), CallError> {
        let mut frame = Frame::reply_ok(id, result)?;
        frame.request_uid = request_uid;
        self.out_tx.send(frame).await.map_err(|_| CallError::Disconnected)
    }

    /// Answer an incoming request with an error.
    pub async fn reply_err(&self, id: u64, error: RpcError) -> Result<(), CallError> {
        self.out_tx
            .send(Frame::reply_err(id, error))
            .await
            .map_err(|_| CallError::Disconnected)
    }

    /// Tear down the link. Reader and writer tasks exit; pending calls fail.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn forget(&self, id: u64) {
        if let Some(map) = self.pending.lock().as_mut() {
            map.remove(&id);
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut out_rx: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = out_rx.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let payload = match encode(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to encode frame: {e}");
                continue;
            }
        };
        if let Err(e) = write_message(&mut writer, &payload).await {
            debug!("write failed, closing link: {e}");
            break;
        }
    }
    cancel.cancel();
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    in_tx: mpsc::Sender<Incoming>,
    pending: Arc<Mutex<Option<PendingMap>>>,
    cancel: CancellationToken,
) {
    loop {
        let bytes = tokio::select! {
            _ = cancel.cancelled() => break,
            res = read_message(&mut reader) => match res {
                Ok(bytes) => bytes,
                Err(ProtocolError::Closed) => break,
                Err(e) => {
                    debug!("read failed, closing link: {e}");
                    break;
                }
            },
        };

        let frame: Frame = match decode(&bytes) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("malformed frame: {e}");
                continue;
            }
        };

        match frame.kind() {
            FrameKind::Reply { id, result } => {
                let sender = pending.lock().as_mut().and_then(|map| map.remove(&id));
                match sender {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => trace!("reply for unknown request id {id}"),
                }
            }
            FrameKind::Request { id, method, params, request_uid } => {
                if in_tx.send(Incoming::Request { id, method, params, request_uid }).await.is_err()
                {
                    break;
                }
            }
            FrameKind::Notification { method, params } => {
                if in_tx.send(Incoming::Notification { method, params }).await.is_err() {
                    break;
                }
            }
            FrameKind::Invalid => warn!("frame is neither request, reply, nor notification"),
        }
    }

    cancel.cancel();
    // Fail every outstanding call and reject new ones.
    *pending.lock() = None;
}

#[cfg(test)]
#[path = "rpc_tests.rs"]
mod tests;
