// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for the runq process tree.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload. The
//! payload is a versioned envelope: requests `{v, id, method, params?}`,
//! replies `{v, id, result}` or `{v, id, error: {code, message}}`,
//! notifications `{v, method, params?}`.
//!
//! The same framing carries all three links: Watchdog<->Manager,
//! Manager<->Worker, and client<->Manager (control channel).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod control;
mod envelope;
mod framing;
mod rpc;
pub mod watchdog;
pub mod worker;

pub use envelope::{decode_body, Frame, FrameKind, RpcError, PROTOCOL_VERSION};
pub use framing::{decode, encode, read_message, write_message, ProtocolError, MAX_FRAME_LEN};
pub use rpc::{CallError, Incoming, RpcPeer};
