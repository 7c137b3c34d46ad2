/*
 *  Copyright 2025-2026 Seatline Developers
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */


//! Seatline server binary.

use anyhow::{Context, Result};
use clap::Parser;
use seatline::queue::NotificationQueue;
use seatline::registration::RegistrationOrchestrator;
use seatline::scheduler::Scheduler;
use seatline::worker::{MailboxChannel, NotificationWorker, WorkerPool};
use seatline::{Database, DAL};
use seatline_server::config::LogFormat;
use seatline_server::{router, AppState, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Seatline - competition registration API
#[derive(Parser)]
#[command(name = "seatline-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SEATLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL, overriding the configuration file
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Listen address, overriding the configuration file
    #[arg(long, env = "SEATLINE_BIND")]
    bind: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Do not run the reminder scan and maintenance sweeps in this process
    #[arg(long)]
    no_scheduler: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Received shutdown signal");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.json_logs {
        config.server.log_format = LogFormat::Json;
    }
    if args.no_scheduler {
        config.scheduler.enabled = false;
    }

    init_tracing(config.server.log_format, args.verbose);
    config
        .validate()
        .context("Configuration validation failed")?;

    let database = Database::try_new(&config.database.url, config.database.pool_size)
        .context("Failed to connect to database")?;
    database
        .run_migrations()
        .await
        .context("Failed to run database migrations")?;
    info!(backend = database.backend().as_str(), "database ready");
    let dal = DAL::new(database);

    let lock = config.lock.build(&dal);
    let worker_config = config.worker_config();
    let queue = NotificationQueue::with_polling(dal.clone(), worker_config.poll_interval());
    let orchestrator = RegistrationOrchestrator::new(
        dal.clone(),
        lock.clone(),
        queue.clone(),
        config.registration_config()?,
    );

    let workers = WorkerPool::spawn(NotificationWorker::new(
        dal.clone(),
        queue.clone(),
        Arc::new(MailboxChannel::new(dal.clone())),
        worker_config,
    ));

    let scheduler = if config.scheduler.enabled {
        Some(
            Scheduler::start(dal.clone(), queue, lock, config.scheduler_config()?)
                .context("Failed to start scheduler")?,
        )
    } else {
        info!("scheduler disabled");
        None
    };

    let state = AppState::new(dal, orchestrator).with_max_body_bytes(config.server.max_body_bytes);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!(address = %config.server.bind, "seatline server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Shutting down gracefully...");
    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    let background = async {
        workers.shutdown().await;
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
    };
    if tokio::time::timeout(timeout, background).await.is_err() {
        warn!(?timeout, "background tasks did not stop in time");
    }

    info!("Server stopped");
    Ok(())
}
