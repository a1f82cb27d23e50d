// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runqd`: the top-level queue server entry point.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use runq_watchdog::{Supervisor, WatchdogConfig};

fn init_tracing(config: &WatchdogConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_env("RUNQ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    if std::fs::create_dir_all(&config.log_dir).is_ok() {
        let appender = tracing_appender::rolling::never(&config.log_dir, "watchdog.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let config = match WatchdogConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("runqd: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    let _guard = init_tracing(&config);
    info!(state_dir = %config.state_dir.display(), "runqd starting");

    match Supervisor::new(config).run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("watchdog failed: {e}");
            eprintln!("runqd: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
