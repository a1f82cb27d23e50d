// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runq`: control client for the runq queue server.
//!
//! Exit codes: 0 success; 2 the manager rejected the request
//! (`success=false`); 4 client-side argument error; 70 timeout or
//! unreachable manager.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod request;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use client::SendError;
use request::{Cmd, EnvCmd, HistoryCmd, ManagerCmd, QueueCmd, ReCmd};

const EXIT_OK: u8 = 0;
const EXIT_REJECTED: u8 = 2;
const EXIT_USAGE: u8 = 4;
const EXIT_UNREACHABLE: u8 = 70;

#[derive(Parser)]
#[command(name = "runq", version, about = "Control client for the runq queue server")]
struct Cli {
    /// Control socket path (default: the state directory's endpoint)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Request deadline in milliseconds
    #[arg(long, global = true, default_value_t = 5000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the manager answers
    Ping,
    /// Manager, environment, and queue status
    Status,
    /// Queue contents and execution
    #[command(subcommand)]
    Queue(QueueCmd),
    /// Worker environment lifecycle
    #[command(subcommand)]
    Env(EnvCmd),
    /// Pause and continuation of the running plan
    #[command(subcommand)]
    Re(ReCmd),
    /// Completed plan attempts
    #[command(subcommand)]
    History(HistoryCmd),
    /// Manager process lifecycle
    #[command(subcommand)]
    Manager(ManagerCmd),
    /// Plans the environment allows
    PlansAllowed,
    /// Devices the environment allows
    DevicesAllowed,
}

impl Command {
    fn into_cmd(self) -> Cmd {
        match self {
            Command::Ping => Cmd::Ping,
            Command::Status => Cmd::Status,
            Command::Queue(cmd) => Cmd::Queue(cmd),
            Command::Env(cmd) => Cmd::Env(cmd),
            Command::Re(cmd) => Cmd::Re(cmd),
            Command::History(cmd) => Cmd::History(cmd),
            Command::Manager(cmd) => Cmd::Manager(cmd),
            Command::PlansAllowed => Cmd::PlansAllowed,
            Command::DevicesAllowed => Cmd::DevicesAllowed,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let req = match request::build(cli.command.into_cmd()) {
        Ok(req) => req,
        Err(e) => {
            eprintln!("runq: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let socket = match client::control_socket(cli.socket) {
        Ok(socket) => socket,
        Err(e) => {
            eprintln!("runq: {e:#}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    let deadline = Duration::from_millis(cli.timeout_ms);
    match client::send(&socket, &req, deadline).await {
        Ok(reply) => {
            match serde_json::to_string_pretty(&reply) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{reply:?}"),
            }
            if reply.success {
                ExitCode::from(EXIT_OK)
            } else {
                ExitCode::from(EXIT_REJECTED)
            }
        }
        Err(SendError::Timeout) => {
            eprintln!("runq: the manager did not respond within {}ms", cli.timeout_ms);
            ExitCode::from(EXIT_UNREACHABLE)
        }
        Err(SendError::Other(e)) => {
            eprintln!("runq: {e:#}");
            ExitCode::from(EXIT_UNREACHABLE)
        }
    }
}
