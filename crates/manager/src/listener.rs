// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control channel listener.
//!
//! Accepts client connections and forwards decoded requests into the
//! manager control loop. Requests on one connection are answered in order:
//! the reply to request N is written before request N+1 is read. When the
//! manager deliberately drops a reply slot (`manager_kill`), the client is
//! left hanging until its own deadline.

use tokio::net::UnixListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use runq_wire::control::ControlRequest;
use runq_wire::{decode_body, Incoming, RpcPeer};

use crate::manager::ManagerMsg;

pub struct ControlListener {
    listener: UnixListener,
    msg_tx: mpsc::Sender<ManagerMsg>,
}

impl ControlListener {
    pub fn new(listener: UnixListener, msg_tx: mpsc::Sender<ManagerMsg>) -> Self {
        Self { listener, msg_tx }
    }

    /// Accept connections until the process exits.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _)) => {
                    let msg_tx = self.msg_tx.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, msg_tx).await;
                    });
                }
                Err(e) => error!("control accept error: {e}"),
            }
        }
    }
}

async fn handle_connection(stream: tokio::net::UnixStream, msg_tx: mpsc::Sender<ManagerMsg>) {
    let (peer, mut incoming) = RpcPeer::spawn(stream);
    while let Some(msg) = incoming.recv().await {
        match msg {
            Incoming::Request { id, method, params, request_uid } => {
                match decode_body::<ControlRequest>(&method, params) {
                    Ok(req) => {
                        let (reply_tx, reply_rx) = oneshot::channel();
                        let sent = msg_tx
                            .send(ManagerMsg::Client {
                                req,
                                request_uid: request_uid.clone(),
                                reply: reply_tx,
                            })
                            .await;
                        if sent.is_err() {
                            return;
                        }
                        match reply_rx.await {
                            Ok(reply) => {
                                if peer.reply_ok_with_uid(id, &reply, request_uid).await.is_err() {
                                    return;
                                }
                            }
                            // The manager dropped the reply slot
                            // (manager_kill): deliberately do not answer.
                            Err(_) => debug!("request {method} left unanswered"),
                        }
                    }
                    Err(e) => {
                        if peer.reply_err(id, e).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Incoming::Notification { method, .. } => {
                debug!("ignoring notification on the control channel: {method}");
            }
        }
    }
}
