// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gantryd: the gantry server process.
//!
//! Bootstraps the store, then runs the loops selected by
//! `GANTRY_SERVER_TYPE`. Exit codes: 0 normal, 2 configuration failure,
//! 1 unrecoverable store error.

mod env;

use anyhow::Context as _;
use gantry_core::SystemClock;
use gantry_engine::{ActionRegistry, ExecutionHost, HostConfig};
use gantry_store::{DataService, Database};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match env::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {}", e);
            return ExitCode::from(2);
        }
    };
    init_logging(&config);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            ExitCode::from(1)
        }
    }
}

fn init_logging(config: &env::Config) {
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    tracing::debug!(?config, "configuration loaded");
}

async fn run(config: env::Config) -> anyhow::Result<()> {
    tracing::info!(server_type = %config.server_type, uri = %config.database_uri, "starting gantryd");

    let database =
        Database::connect(&config.database_uri).await.context("connecting database")?;
    let data = DataService::open(database, &config.database_table)
        .await
        .context("opening data service")?;
    data.bootstrap(&config.admin_username, &config.admin_password)
        .await
        .context("bootstrapping system")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
                cancel.cancel();
            }
        });
    }

    match config.server_type {
        env::ServerType::Scheduler => {
            let host = ExecutionHost::start(
                data,
                SystemClock,
                Arc::new(ActionRegistry::builtin()),
                HostConfig {
                    worker_count: config.worker_count,
                    queue_capacity: config.queue_capacity,
                    scheduler_interval: config.scheduler_tick,
                },
            )
            .await
            .context("starting execution server")?;
            host.run(cancel).await.context("running execution server")?;
        }
        env::ServerType::Web => {
            // The HTTP surface is an external consumer of the data service;
            // this process only keeps the store bootstrapped.
            tracing::info!("data service ready; waiting for shutdown");
            cancel.cancelled().await;
        }
    }

    tracing::info!("gantryd stopped");
    Ok(())
}
