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

//! Configuration types for registration, notification delivery and scheduling.
//!
//! Each config has private fields, getters, and a builder whose `Default`
//! carries the production defaults. Builders that can produce an invalid
//! combination validate in `build()`.

use std::time::Duration;

use croner::Cron;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the registration orchestrator.
///
/// The transaction timeout must be strictly below the lock TTL so that a
/// transaction never outlives the lock that admitted it. Serializable
/// isolation remains the correctness guarantee either way; the bound only keeps
/// the lock meaningful as contention reduction.
///
/// # Example
///
/// ```rust
/// use seatline::RegistrationConfig;
/// use std::time::Duration;
///
/// let config = RegistrationConfig::builder()
///     .lock_ttl(Duration::from_secs(10))
///     .transaction_timeout(Duration::from_secs(8))
///     .build()
///     .unwrap();
/// assert_eq!(config.lock_ttl(), Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    lock_ttl: Duration,
    transaction_timeout: Duration,
    idempotency_ttl: Duration,
    serialization_retries: u32,
    confirmation_job: JobOptions,
}

impl RegistrationConfig {
    pub fn builder() -> RegistrationConfigBuilder {
        RegistrationConfigBuilder::default()
    }

    /// Maximum time a competition lock may be held.
    pub fn lock_ttl(&self) -> Duration {
        self.lock_ttl
    }

    /// Deadline for the guarded registration transaction.
    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }

    /// How long a stored idempotent response stays valid.
    pub fn idempotency_ttl(&self) -> Duration {
        self.idempotency_ttl
    }

    /// Re-runs of the transaction after a serialization failure before the
    /// attempt is reported as busy.
    pub fn serialization_retries(&self) -> u32 {
        self.serialization_retries
    }

    /// Options for the confirmation job enqueued after a registration commits.
    pub fn confirmation_job(&self) -> &JobOptions {
        &self.confirmation_job
    }

    /// Checks the cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transaction_timeout >= self.lock_ttl {
            return Err(ConfigError::TimeoutNotBelowLockTtl {
                transaction_timeout: self.transaction_timeout,
                lock_ttl: self.lock_ttl,
            });
        }
        if self.lock_ttl.is_zero() {
            return Err(ConfigError::Invalid("lock TTL must be positive".to_string()));
        }
        self.confirmation_job.validate()
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        RegistrationConfigBuilder::default().config
    }
}

/// Builder for [`RegistrationConfig`].
#[derive(Debug, Clone)]
pub struct RegistrationConfigBuilder {
    config: RegistrationConfig,
}

impl Default for RegistrationConfigBuilder {
    fn default() -> Self {
        Self {
            config: RegistrationConfig {
                lock_ttl: Duration::from_secs(5),
                transaction_timeout: Duration::from_secs(4),
                idempotency_ttl: Duration::from_secs(24 * 60 * 60),
                serialization_retries: 3,
                confirmation_job: JobOptions::default(),
            },
        }
    }
}

impl RegistrationConfigBuilder {
    pub fn lock_ttl(mut self, value: Duration) -> Self {
        self.config.lock_ttl = value;
        self
    }

    pub fn transaction_timeout(mut self, value: Duration) -> Self {
        self.config.transaction_timeout = value;
        self
    }

    pub fn idempotency_ttl(mut self, value: Duration) -> Self {
        self.config.idempotency_ttl = value;
        self
    }

    pub fn serialization_retries(mut self, value: u32) -> Self {
        self.config.serialization_retries = value;
        self
    }

    pub fn confirmation_job(mut self, value: JobOptions) -> Self {
        self.config.confirmation_job = value;
        self
    }

    pub fn build(self) -> Result<RegistrationConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Retry delay policy for a notification job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    /// `delay * 2^(attempt - 1)` after the n-th failed attempt.
    Exponential {
        #[serde(with = "duration_ms")]
        delay: Duration,
    },
    /// The same delay after every failed attempt.
    Fixed {
        #[serde(with = "duration_ms")]
        delay: Duration,
    },
}

impl Backoff {
    /// Delay before the next attempt, given how many attempts have failed.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential { delay } => {
                let exponent = failed_attempts.saturating_sub(1).min(20);
                delay.saturating_mul(1u32 << exponent)
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Backoff::Exponential { .. } => "exponential",
            Backoff::Fixed { .. } => "fixed",
        }
    }

    pub fn base_delay(&self) -> Duration {
        match self {
            Backoff::Exponential { delay } | Backoff::Fixed { delay } => *delay,
        }
    }

    /// Rebuilds a policy from its stored column values.
    pub fn from_parts(kind: &str, delay: Duration) -> Option<Self> {
        match kind {
            "exponential" => Some(Backoff::Exponential { delay }),
            "fixed" => Some(Backoff::Fixed { delay }),
            _ => None,
        }
    }
}

/// Delivery options attached to every enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOptions {
    pub attempts: u32,
    pub backoff: Backoff,
    pub remove_on_success: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Backoff::Exponential {
                delay: Duration::from_millis(2000),
            },
            remove_on_success: true,
        }
    }
}

impl JobOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempts == 0 {
            return Err(ConfigError::Invalid(
                "job attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration for notification workers.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    concurrency: usize,
    batch_size: usize,
    poll_interval: Duration,
    visibility_timeout: Duration,
    worker_id: Option<String>,
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }

    /// Number of worker loops in a pool.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Maximum jobs claimed per poll.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Delay between polls when the queue is empty. Build the queue's
    /// distributor with it through
    /// [`NotificationQueue::with_polling`](crate::queue::NotificationQueue::with_polling).
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long a claimed job stays invisible to other workers.
    pub fn visibility_timeout(&self) -> Duration {
        self.visibility_timeout
    }

    /// Explicit worker identity; a random one is generated when unset.
    pub fn worker_id(&self) -> Option<&str> {
        self.worker_id.as_deref()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfigBuilder::default().build()
    }
}

/// Builder for [`WorkerConfig`].
#[derive(Debug, Clone)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self {
            config: WorkerConfig {
                concurrency: 2,
                batch_size: 10,
                poll_interval: Duration::from_millis(500),
                visibility_timeout: Duration::from_secs(60),
                worker_id: None,
            },
        }
    }
}

impl WorkerConfigBuilder {
    pub fn concurrency(mut self, value: usize) -> Self {
        self.config.concurrency = value.max(1);
        self
    }

    pub fn batch_size(mut self, value: usize) -> Self {
        self.config.batch_size = value.max(1);
        self
    }

    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    pub fn visibility_timeout(mut self, value: Duration) -> Self {
        self.config.visibility_timeout = value;
        self
    }

    pub fn worker_id(mut self, value: Option<String>) -> Self {
        self.config.worker_id = value;
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

/// Configuration for periodic background work.
///
/// Schedules are standard five-field cron expressions evaluated in UTC.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    reminder_schedule: String,
    reminder_lookahead: Duration,
    idempotency_sweep_schedule: String,
    registration_purge_schedule: String,
    soft_delete_retention: Duration,
    lock_sweep_interval: Duration,
    reminder_job: JobOptions,
}

impl SchedulerConfig {
    pub fn builder() -> SchedulerConfigBuilder {
        SchedulerConfigBuilder::default()
    }

    pub fn reminder_schedule(&self) -> &str {
        &self.reminder_schedule
    }

    /// How far ahead of now a competition start counts as "soon".
    pub fn reminder_lookahead(&self) -> Duration {
        self.reminder_lookahead
    }

    pub fn idempotency_sweep_schedule(&self) -> &str {
        &self.idempotency_sweep_schedule
    }

    pub fn registration_purge_schedule(&self) -> &str {
        &self.registration_purge_schedule
    }

    /// Age after which soft-deleted registrations are purged.
    pub fn soft_delete_retention(&self) -> Duration {
        self.soft_delete_retention
    }

    pub fn lock_sweep_interval(&self) -> Duration {
        self.lock_sweep_interval
    }

    pub fn reminder_job(&self) -> &JobOptions {
        &self.reminder_job
    }

    /// Parses every cron expression.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for expression in [
            &self.reminder_schedule,
            &self.idempotency_sweep_schedule,
            &self.registration_purge_schedule,
        ] {
            parse_schedule(expression)?;
        }
        self.reminder_job.validate()
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfigBuilder::default().config
    }
}

/// Builder for [`SchedulerConfig`].
#[derive(Debug, Clone)]
pub struct SchedulerConfigBuilder {
    config: SchedulerConfig,
}

impl Default for SchedulerConfigBuilder {
    fn default() -> Self {
        Self {
            config: SchedulerConfig {
                reminder_schedule: "0 0 * * *".to_string(),
                reminder_lookahead: Duration::from_secs(24 * 60 * 60),
                idempotency_sweep_schedule: "0 2 * * *".to_string(),
                registration_purge_schedule: "0 3 * * 0".to_string(),
                soft_delete_retention: Duration::from_secs(30 * 24 * 60 * 60),
                lock_sweep_interval: Duration::from_secs(60),
                reminder_job: JobOptions::default(),
            },
        }
    }
}

impl SchedulerConfigBuilder {
    pub fn reminder_schedule(mut self, value: impl Into<String>) -> Self {
        self.config.reminder_schedule = value.into();
        self
    }

    pub fn reminder_lookahead(mut self, value: Duration) -> Self {
        self.config.reminder_lookahead = value;
        self
    }

    pub fn idempotency_sweep_schedule(mut self, value: impl Into<String>) -> Self {
        self.config.idempotency_sweep_schedule = value.into();
        self
    }

    pub fn registration_purge_schedule(mut self, value: impl Into<String>) -> Self {
        self.config.registration_purge_schedule = value.into();
        self
    }

    pub fn soft_delete_retention(mut self, value: Duration) -> Self {
        self.config.soft_delete_retention = value;
        self
    }

    pub fn lock_sweep_interval(mut self, value: Duration) -> Self {
        self.config.lock_sweep_interval = value;
        self
    }

    pub fn reminder_job(mut self, value: JobOptions) -> Self {
        self.config.reminder_job = value;
        self
    }

    pub fn build(self) -> Result<SchedulerConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Parses a cron expression, mapping parse errors to [`ConfigError`].
pub fn parse_schedule(expression: &str) -> Result<Cron, ConfigError> {
    Cron::new(expression)
        .parse()
        .map_err(|e| ConfigError::InvalidSchedule {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
