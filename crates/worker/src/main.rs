// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runq-worker`: execution engine host, spawned by the watchdog on
//! manager request.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_env("RUNQ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match runq_worker::env::log_dir() {
        Some(dir) if std::fs::create_dir_all(&dir).is_ok() => {
            let appender = tracing_appender::rolling::never(dir, "worker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _guard = init_tracing();

    let config = match runq_worker::env::worker_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("runq-worker: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(socket = %config.socket_path.display(), "runq worker starting");
    match runq_worker::service::run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("worker failed: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
