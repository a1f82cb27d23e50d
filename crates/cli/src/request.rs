// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build control requests from CLI arguments. Argument errors here exit
//! with the usage code, never reach the manager.

use anyhow::{bail, Result};
use clap::Subcommand;
use runq_core::{ItemRef, MoveDestination, PauseMode, PlanSpec, QueuePosition};
use runq_wire::control::{ControlRequest, StopOption};

use crate::client::{parse_args, parse_kwargs};

/// Internal command tree mirrored from the clap surface.
pub enum Cmd {
    Ping,
    Status,
    Queue(QueueCmd),
    Env(EnvCmd),
    Re(ReCmd),
    History(HistoryCmd),
    Manager(ManagerCmd),
    PlansAllowed,
    DevicesAllowed,
}

#[derive(Subcommand)]
pub enum QueueCmd {
    /// Add a plan to the queue
    Add {
        /// Plan name
        name: String,
        /// Positional arguments as a JSON array
        #[arg(long)]
        args: Option<String>,
        /// Keyword arguments as a JSON object
        #[arg(long)]
        kwargs: Option<String>,
        /// Insert position: an integer, "front", or "back"
        #[arg(long, conflicts_with_all = ["before_uid", "after_uid"])]
        pos: Option<String>,
        /// Insert directly before the item with this UID
        #[arg(long, conflicts_with = "after_uid")]
        before_uid: Option<String>,
        /// Insert directly after the item with this UID
        #[arg(long)]
        after_uid: Option<String>,
    },
    /// Show one item (default: the back of the queue)
    Get {
        /// Position: an integer (negatives count from the back)
        #[arg(long, conflicts_with = "uid")]
        pos: Option<i64>,
        #[arg(long)]
        uid: Option<String>,
    },
    /// Remove one item (default: the back of the queue)
    Remove {
        #[arg(long, conflicts_with = "uid")]
        pos: Option<i64>,
        #[arg(long)]
        uid: Option<String>,
    },
    /// Move an item
    Move {
        /// Source position
        #[arg(long, conflicts_with = "uid")]
        pos: Option<i64>,
        /// Source UID
        #[arg(long)]
        uid: Option<String>,
        /// Destination: an integer, "front", or "back"
        #[arg(long, conflicts_with_all = ["before_uid", "after_uid"])]
        dest: Option<String>,
        #[arg(long, conflicts_with = "after_uid")]
        before_uid: Option<String>,
        #[arg(long)]
        after_uid: Option<String>,
    },
    /// Show the whole queue
    List,
    /// Remove every queued item
    Clear,
    /// Start executing the queue
    Start,
    /// Stop after the current plan finishes
    Stop,
    /// Cancel a pending stop
    StopCancel,
}

#[derive(Subcommand)]
pub enum EnvCmd {
    /// Spawn a worker and load its startup profile
    Open,
    /// Orderly shutdown of the worker
    Close,
    /// Force-kill the worker (usable in any state)
    Destroy,
}

#[derive(Subcommand)]
pub enum ReCmd {
    /// Pause the running plan
    Pause {
        /// Interrupt the step in progress instead of finishing it
        #[arg(long)]
        immediate: bool,
    },
    /// Continue the paused plan
    Resume,
    /// Stop the paused plan cleanly; the queue continues
    Stop,
    /// Abort the paused plan; queue execution goes idle
    Abort,
    /// Halt the paused plan; queue execution goes idle
    Halt,
}

#[derive(Subcommand)]
pub enum HistoryCmd {
    /// Show completed plan attempts
    List,
    /// Clear the history
    Clear,
}

#[derive(Subcommand)]
pub enum ManagerCmd {
    /// Orderly manager exit (refused while a plan runs)
    Stop {
        /// Force the exit even while a plan is running
        #[arg(long = "unsafe")]
        force: bool,
    },
    /// Diagnostic: make the manager unresponsive so the watchdog
    /// restarts it
    Kill,
}

pub fn build(cmd: Cmd) -> Result<ControlRequest> {
    Ok(match cmd {
        Cmd::Ping => ControlRequest::Ping,
        Cmd::Status => ControlRequest::Status,
        Cmd::PlansAllowed => ControlRequest::PlansAllowed,
        Cmd::DevicesAllowed => ControlRequest::DevicesAllowed,

        Cmd::Queue(QueueCmd::Add { name, args, kwargs, pos, before_uid, after_uid }) => {
            let item = PlanSpec {
                name,
                args: parse_args(args.as_deref())?,
                kwargs: parse_kwargs(kwargs.as_deref())?,
                meta: serde_json::Map::new(),
            };
            let pos = match (pos, before_uid, after_uid) {
                (None, None, None) => None,
                (Some(text), None, None) => Some(parse_position(&text)?),
                (None, Some(uid), None) => Some(QueuePosition::BeforeUid(uid.into())),
                (None, None, Some(uid)) => Some(QueuePosition::AfterUid(uid.into())),
                // clap's conflicts_with rules make this unreachable.
                _ => bail!("--pos, --before-uid, and --after-uid are mutually exclusive"),
            };
            ControlRequest::QueueItemAdd { item, pos }
        }
        Cmd::Queue(QueueCmd::Get { pos, uid }) => {
            ControlRequest::QueueItemGet { item: item_ref(pos, uid) }
        }
        Cmd::Queue(QueueCmd::Remove { pos, uid }) => {
            ControlRequest::QueuePlanRemove { item: item_ref(pos, uid) }
        }
        Cmd::Queue(QueueCmd::Move { pos, uid, dest, before_uid, after_uid }) => {
            let src = match item_ref(pos, uid) {
                Some(src) => src,
                None => bail!("a move needs a source: --pos or --uid"),
            };
            let dst = match (dest, before_uid, after_uid) {
                (Some(text), None, None) => parse_destination(&text)?,
                (None, Some(uid), None) => MoveDestination::BeforeUid(uid.into()),
                (None, None, Some(uid)) => MoveDestination::AfterUid(uid.into()),
                (None, None, None) => {
                    bail!("a move needs a destination: --dest, --before-uid, or --after-uid")
                }
                _ => bail!("--dest, --before-uid, and --after-uid are mutually exclusive"),
            };
            ControlRequest::QueuePlanMove { src, dst }
        }
        Cmd::Queue(QueueCmd::List) => ControlRequest::QueueGet,
        Cmd::Queue(QueueCmd::Clear) => ControlRequest::QueueClear,
        Cmd::Queue(QueueCmd::Start) => ControlRequest::QueueStart,
        Cmd::Queue(QueueCmd::Stop) => ControlRequest::QueueStop,
        Cmd::Queue(QueueCmd::StopCancel) => ControlRequest::QueueStopCancel,

        Cmd::Env(EnvCmd::Open) => ControlRequest::EnvironmentOpen,
        Cmd::Env(EnvCmd::Close) => ControlRequest::EnvironmentClose,
        Cmd::Env(EnvCmd::Destroy) => ControlRequest::EnvironmentDestroy,

        Cmd::Re(ReCmd::Pause { immediate }) => ControlRequest::RePause {
            mode: if immediate { PauseMode::Immediate } else { PauseMode::Deferred },
        },
        Cmd::Re(ReCmd::Resume) => ControlRequest::ReResume,
        Cmd::Re(ReCmd::Stop) => ControlRequest::ReStop,
        Cmd::Re(ReCmd::Abort) => ControlRequest::ReAbort,
        Cmd::Re(ReCmd::Halt) => ControlRequest::ReHalt,

        Cmd::History(HistoryCmd::List) => ControlRequest::HistoryGet,
        Cmd::History(HistoryCmd::Clear) => ControlRequest::HistoryClear,

        Cmd::Manager(ManagerCmd::Stop { force }) => ControlRequest::ManagerStop {
            option: if force { StopOption::SafeOff } else { StopOption::SafeOn },
        },
        Cmd::Manager(ManagerCmd::Kill) => ControlRequest::ManagerKill,
    })
}

fn item_ref(pos: Option<i64>, uid: Option<String>) -> Option<ItemRef> {
    match (pos, uid) {
        (Some(pos), _) => Some(ItemRef::Index(pos)),
        (None, Some(uid)) => Some(ItemRef::Uid(uid.into())),
        (None, None) => None,
    }
}

fn parse_position(text: &str) -> Result<QueuePosition> {
    match text {
        "front" => Ok(QueuePosition::Front),
        "back" => Ok(QueuePosition::Back),
        other => match other.parse::<i64>() {
            Ok(index) => Ok(QueuePosition::Index(index)),
            Err(_) => bail!("position must be an integer, \"front\", or \"back\": got {other:?}"),
        },
    }
}

fn parse_destination(text: &str) -> Result<MoveDestination> {
    match text {
        "front" => Ok(MoveDestination::Front),
        "back" => Ok(MoveDestination::Back),
        other => match other.parse::<i64>() {
            Ok(index) => Ok(MoveDestination::Index(index)),
            Err(_) => {
                bail!("destination must be an integer, \"front\", or \"back\": got {other:?}")
            }
        },
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
