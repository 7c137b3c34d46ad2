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

//! # Seatline
//!
//! Seatline registers participants for capacity-limited competitions without
//! overselling seats, without double registrations, and with safe replay of
//! client retries. Confirmed registrations fan out into a durable notification
//! queue that retries with backoff and dead-letters jobs that keep failing.
//!
//! ## Components
//!
//! - [`idempotency::IdempotencyStore`]: write-once response cache keyed by the
//!   client's idempotency token
//! - [`lock::DistributedLock`]: per-competition mutual exclusion with TTL and
//!   compare-and-delete release
//! - [`dal::DAL`]: transactional persistence, including the serializable
//!   registration transaction
//! - [`registration::RegistrationOrchestrator`]: the registration workflow
//! - [`queue::NotificationQueue`] and [`worker::NotificationWorker`]: at-least-once
//!   delivery with retry and dead-lettering
//! - [`scheduler::Scheduler`] and [`maintenance::MaintenanceSweeper`]:
//!   periodic work decoupled from request handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use seatline::lock::InMemoryLockStore;
//! use seatline::queue::NotificationQueue;
//! use seatline::registration::{RegistrationOrchestrator, RegistrationRequest};
//! use seatline::worker::{MailboxChannel, NotificationWorker, WorkerPool};
//! use seatline::{Database, RegistrationConfig, WorkerConfig, DAL};
//! use std::sync::Arc;
//!
//! let database = Database::try_new("sqlite://seatline.db", 4)?;
//! database.run_migrations().await?;
//! let dal = DAL::new(database);
//!
//! let worker_config = WorkerConfig::default();
//! let queue = NotificationQueue::with_polling(dal.clone(), worker_config.poll_interval());
//! let orchestrator = RegistrationOrchestrator::new(
//!     dal.clone(),
//!     Arc::new(InMemoryLockStore::new()),
//!     queue.clone(),
//!     RegistrationConfig::default(),
//! );
//!
//! let workers = WorkerPool::spawn(NotificationWorker::new(
//!     dal.clone(),
//!     queue,
//!     Arc::new(MailboxChannel::new(dal.clone())),
//!     worker_config,
//! ));
//!
//! let receipt = orchestrator
//!     .register(RegistrationRequest::new(competition_id, user_id))
//!     .await?;
//! println!("{}", receipt.body);
//!
//! workers.shutdown().await;
//! ```

#[cfg(not(any(feature = "postgres", feature = "sqlite")))]
compile_error!("seatline requires at least one of the `postgres` or `sqlite` features");

pub mod config;
pub mod dal;
pub mod database;
pub mod error;
pub mod idempotency;
pub mod lock;
pub mod maintenance;
pub mod metrics;
pub mod models;
pub mod queue;
pub mod registration;
pub mod scheduler;
pub mod worker;

pub use config::{RegistrationConfig, SchedulerConfig, WorkerConfig};
pub use dal::DAL;
pub use database::{BackendType, Database};
pub use error::{ErrorKind, RegistrationError, StoreError};

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// When `level` is `None` the filter is taken from `RUST_LOG`, falling back to
/// `info`. Calling this more than once is harmless: later calls leave the
/// already-installed subscriber in place.
pub fn init_logging(level: Option<Level>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
