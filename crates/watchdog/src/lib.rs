// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! runq-watchdog: the top-level supervisor (`runqd`).
//!
//! The watchdog spawns the manager, restarts it when its heartbeat goes
//! silent, and holds the worker's OS handle on the manager's behalf. A
//! manager restart never touches the worker: the worker keeps executing
//! and the fresh manager re-adopts it over the surviving socket endpoint.

pub mod env;
pub mod rpc;
pub mod supervisor;

pub use env::WatchdogConfig;
pub use supervisor::{Supervisor, SupervisorError};
