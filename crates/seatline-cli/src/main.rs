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


//! Seatline CLI - operational commands against a Seatline database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

/// Seatline - competition registration operations
#[derive(Parser)]
#[command(name = "seatline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (can also be set via DATABASE_URL environment variable)
    #[arg(long, env = "DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Maintenance commands that delete expired or withdrawn data
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
    /// Inspect dead-lettered notification jobs
    FailedJobs {
        #[command(subcommand)]
        command: FailedJobCommands,
    },
    /// Apply pending database migrations
    Migrate,
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Delete idempotency records whose TTL has elapsed
    PurgeIdempotency {
        /// Preview what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Hard-delete withdrawn registrations
    PurgeRegistrations {
        /// Delete registrations withdrawn longer ago than this (e.g., "30d", "7d12h")
        #[arg(long, default_value = "30d")]
        older_than: String,

        /// Preview what would be deleted without actually deleting
        #[arg(long)]
        dry_run: bool,
    },
    /// Delete competition lock rows whose TTL has elapsed
    PurgeLocks,
}

#[derive(Subcommand)]
enum FailedJobCommands {
    /// List dead-lettered jobs, most recent first
    List {
        #[arg(long, default_value_t = 1)]
        page: i64,

        #[arg(long, default_value_t = 20)]
        per_page: i64,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show one dead-lettered job with its payload
    Show { id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    let database_url = cli.database_url.context(
        "Database URL is required. Set --database-url or DATABASE_URL environment variable",
    )?;
    let dal = commands::connect(&database_url)?;

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::PurgeIdempotency { dry_run } => {
                commands::purge::idempotency(&dal, dry_run).await?;
            }
            AdminCommands::PurgeRegistrations {
                older_than,
                dry_run,
            } => {
                commands::purge::registrations(&dal, &older_than, dry_run).await?;
            }
            AdminCommands::PurgeLocks => {
                commands::purge::locks(&dal).await?;
            }
        },
        Commands::FailedJobs { command } => match command {
            FailedJobCommands::List {
                page,
                per_page,
                json,
            } => {
                commands::failed_jobs::list(&dal, page, per_page, json).await?;
            }
            FailedJobCommands::Show { id } => {
                commands::failed_jobs::show(&dal, id).await?;
            }
        },
        Commands::Migrate => {
            dal.database()
                .run_migrations()
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Migrations applied");
        }
    }

    Ok(())
}
