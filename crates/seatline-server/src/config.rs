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


//! Server configuration file.
//!
//! `seatline.toml` is looked up at the explicit path, then `$SEATLINE_CONFIG`,
//! then `./seatline.toml`. Every section and field is optional; missing values
//! take the library defaults. Command-line flags override the file.
//!
//! ```toml
//! [database]
//! url = "sqlite://seatline.db"
//! pool_size = 1
//!
//! [server]
//! bind = "127.0.0.1:3000"
//! log_format = "json"
//!
//! [registration]
//! lock_ttl_ms = 5000
//! transaction_timeout_ms = 4000
//!
//! [notifications]
//! attempts = 3
//! backoff = "exponential"
//! backoff_delay_ms = 2000
//!
//! [scheduler]
//! reminder_schedule = "0 0 * * *"
//!
//! [lock]
//! backend = "database"
//! ```

use seatline::config::{Backoff, JobOptions};
use seatline::error::ConfigError;
use seatline::lock::{DatabaseLockStore, DistributedLock, InMemoryLockStore};
use seatline::{RegistrationConfig, SchedulerConfig, WorkerConfig, DAL};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const CONFIG_ENV: &str = "SEATLINE_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "seatline.toml";

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("Failed to read configuration file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub database: DatabaseSection,
    pub server: HttpSection,
    pub registration: RegistrationSection,
    pub notifications: NotificationSection,
    pub scheduler: SchedulerSection,
    pub lock: LockSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    pub url: String,
    pub pool_size: u32,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://seatline.db".to_string(),
            pool_size: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub bind: String,
    pub log_format: LogFormat,
    pub max_body_bytes: usize,
    pub shutdown_timeout_secs: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            log_format: LogFormat::Text,
            max_body_bytes: 64 * 1024,
            shutdown_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationSection {
    pub lock_ttl_ms: u64,
    pub transaction_timeout_ms: u64,
    pub idempotency_ttl_secs: u64,
    pub serialization_retries: u32,
}

impl Default for RegistrationSection {
    fn default() -> Self {
        let defaults = RegistrationConfig::default();
        Self {
            lock_ttl_ms: defaults.lock_ttl().as_millis() as u64,
            transaction_timeout_ms: defaults.transaction_timeout().as_millis() as u64,
            idempotency_ttl_secs: defaults.idempotency_ttl().as_secs(),
            serialization_retries: defaults.serialization_retries(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Exponential,
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    pub attempts: u32,
    pub backoff: BackoffKind,
    pub backoff_delay_ms: u64,
    pub remove_on_success: bool,
    pub workers: usize,
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    pub visibility_timeout_secs: u64,
}

impl Default for NotificationSection {
    fn default() -> Self {
        let job = JobOptions::default();
        let worker = WorkerConfig::default();
        Self {
            attempts: job.attempts,
            backoff: BackoffKind::Exponential,
            backoff_delay_ms: job.backoff.base_delay().as_millis() as u64,
            remove_on_success: job.remove_on_success,
            workers: worker.concurrency(),
            batch_size: worker.batch_size(),
            poll_interval_ms: worker.poll_interval().as_millis() as u64,
            visibility_timeout_secs: worker.visibility_timeout().as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub enabled: bool,
    pub reminder_schedule: String,
    pub reminder_lookahead_secs: u64,
    pub idempotency_sweep_schedule: String,
    pub registration_purge_schedule: String,
    pub soft_delete_retention_days: u64,
    pub lock_sweep_interval_secs: u64,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        Self {
            enabled: true,
            reminder_schedule: defaults.reminder_schedule().to_string(),
            reminder_lookahead_secs: defaults.reminder_lookahead().as_secs(),
            idempotency_sweep_schedule: defaults.idempotency_sweep_schedule().to_string(),
            registration_purge_schedule: defaults.registration_purge_schedule().to_string(),
            soft_delete_retention_days: defaults.soft_delete_retention().as_secs() / 86_400,
            lock_sweep_interval_secs: defaults.lock_sweep_interval().as_secs(),
        }
    }
}

/// Where competition locks live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockBackend {
    /// Lock rows in the shared database; safe across processes.
    #[default]
    Database,
    /// Process-local map; only for a single server process.
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSection {
    pub backend: LockBackend,
}

impl LockSection {
    pub fn build(&self, dal: &DAL) -> Arc<dyn DistributedLock> {
        match self.backend {
            LockBackend::Database => Arc::new(DatabaseLockStore::new(dal.clone())),
            LockBackend::Memory => Arc::new(InMemoryLockStore::new()),
        }
    }
}

impl ServerConfig {
    /// Loads the configuration file, or defaults when no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV)
                .map(PathBuf::from)
                .or_else(|| {
                    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
                    local.is_file().then_some(local)
                }),
        };

        match path {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigFileError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(content)?)
    }

    /// Builds and validates every library config, so a bad file fails at
    /// startup rather than on first use.
    pub fn validate(&self) -> Result<(), ConfigFileError> {
        self.registration_config()?;
        self.scheduler_config()?;
        Ok(())
    }

    pub fn job_options(&self) -> JobOptions {
        let n = &self.notifications;
        let delay = Duration::from_millis(n.backoff_delay_ms);
        JobOptions {
            attempts: n.attempts,
            backoff: match n.backoff {
                BackoffKind::Exponential => Backoff::Exponential { delay },
                BackoffKind::Fixed => Backoff::Fixed { delay },
            },
            remove_on_success: n.remove_on_success,
        }
    }

    pub fn registration_config(&self) -> Result<RegistrationConfig, ConfigError> {
        let r = &self.registration;
        RegistrationConfig::builder()
            .lock_ttl(Duration::from_millis(r.lock_ttl_ms))
            .transaction_timeout(Duration::from_millis(r.transaction_timeout_ms))
            .idempotency_ttl(Duration::from_secs(r.idempotency_ttl_secs))
            .serialization_retries(r.serialization_retries)
            .confirmation_job(self.job_options())
            .build()
    }

    pub fn worker_config(&self) -> WorkerConfig {
        let n = &self.notifications;
        WorkerConfig::builder()
            .concurrency(n.workers)
            .batch_size(n.batch_size)
            .poll_interval(Duration::from_millis(n.poll_interval_ms))
            .visibility_timeout(Duration::from_secs(n.visibility_timeout_secs))
            .build()
    }

    pub fn scheduler_config(&self) -> Result<SchedulerConfig, ConfigError> {
        let s = &self.scheduler;
        SchedulerConfig::builder()
            .reminder_schedule(s.reminder_schedule.clone())
            .reminder_lookahead(Duration::from_secs(s.reminder_lookahead_secs))
            .idempotency_sweep_schedule(s.idempotency_sweep_schedule.clone())
            .registration_purge_schedule(s.registration_purge_schedule.clone())
            .soft_delete_retention(Duration::from_secs(s.soft_delete_retention_days * 86_400))
            .lock_sweep_interval(Duration::from_secs(s.lock_sweep_interval_secs))
            .reminder_job(self.job_options())
            .build()
    }
}
