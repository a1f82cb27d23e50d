// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `runq-manager`: the queue server's central controller, spawned and
//! supervised by the watchdog.

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use runq_manager::env::ManagerConfig;

fn init_tracing(config: &ManagerConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_env("RUNQ_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    if std::fs::create_dir_all(&config.log_dir).is_ok() {
        let appender = tracing_appender::rolling::never(&config.log_dir, "manager.log");
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
    let config = match ManagerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("runq-manager: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    let _guard = init_tracing(&config);
    info!(state_dir = %config.state_dir.display(), "runq manager starting");

    let bootstrap = match runq_manager::startup(config).await {
        Ok(bootstrap) => bootstrap,
        Err(e) => {
            error!("manager startup failed: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    tokio::spawn(bootstrap.listener.run());

    match bootstrap.manager.run(bootstrap.msg_rx).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("manager control loop failed: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}
