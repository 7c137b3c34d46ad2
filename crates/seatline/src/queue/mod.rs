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

//! At-least-once notification queue with retry, backoff and dead-lettering.
//!
//! # Job lifecycle
//!
//! ```text
//! enqueue ──> ready ──claim──> in flight ──complete──> removed
//!               ^                  │
//!               │   retry_at       │ fail (attempts left)
//!               └──────────────────┤
//!                                  │ fail (final attempt) / undecodable
//!                                  v
//!                             failed_jobs
//! ```
//!
//! A claimed job whose worker disappears becomes ready again when its
//! visibility timeout lapses, so a job may be delivered more than once.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::JobOptions;
use crate::dal::{NewNotificationJob, DAL};
use crate::error::{QueueError, StoreError};
use crate::metrics;
use crate::models::{NotificationJob, NotificationJobRecord};

mod distributor;

pub use distributor::{PollingDistributor, WorkDistributor};

/// What happened to a job after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDisposition {
    /// The job will be retried at the given time.
    Retried { retry_at: DateTime<Utc> },
    /// The job exhausted its attempts and was recorded in `failed_jobs`.
    DeadLettered { failed_job_id: i64 },
    /// The job exhausted its attempts but the dead-letter write failed. It was
    /// still removed from the queue and will not be processed again.
    DeadLetterLost,
    /// The attempt's claim lapsed and another worker took the job over. The
    /// job was left to that worker.
    ClaimLost,
}

/// Handle for enqueuing and settling notification jobs.
///
/// Cheap to clone; clones share the distributor used to wake workers.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    dal: DAL,
    distributor: Arc<dyn WorkDistributor>,
}

impl NotificationQueue {
    pub fn new(dal: DAL, distributor: Arc<dyn WorkDistributor>) -> Self {
        Self { dal, distributor }
    }

    /// A queue whose idle workers poll every `poll_interval`, normally
    /// [`WorkerConfig::poll_interval`](crate::WorkerConfig::poll_interval).
    pub fn with_polling(dal: DAL, poll_interval: Duration) -> Self {
        Self::new(dal, Arc::new(PollingDistributor::with_poll_interval(poll_interval)))
    }

    pub fn distributor(&self) -> Arc<dyn WorkDistributor> {
        self.distributor.clone()
    }

    /// Validates, persists, and announces a job. Returns the job id.
    pub async fn enqueue(
        &self,
        job: &NotificationJob,
        options: JobOptions,
    ) -> Result<i64, QueueError> {
        self.enqueue_at(job, options, Utc::now()).await
    }

    /// Like [`enqueue`](Self::enqueue), but the job is not claimable before
    /// `available_at`.
    pub async fn enqueue_at(
        &self,
        job: &NotificationJob,
        options: JobOptions,
        available_at: DateTime<Utc>,
    ) -> Result<i64, QueueError> {
        options.validate().map_err(|e| QueueError::InvalidPayload {
            job_name: job.name().to_string(),
            reason: e.to_string(),
        })?;
        let payload = job.encode()?;

        let record = self
            .dal
            .notification_job()
            .create(NewNotificationJob {
                job_name: job.name().to_string(),
                payload,
                options,
                available_at,
            })
            .await?;

        debug!(job_id = record.id, job = job.name(), "job enqueued");
        metrics::record_job_enqueued(job.name());
        self.distributor.notify_work();
        Ok(record.id)
    }

    /// Claims up to `limit` ready jobs.
    pub async fn claim(
        &self,
        worker_id: &str,
        limit: usize,
        visibility_timeout: Duration,
    ) -> Result<Vec<NotificationJobRecord>, QueueError> {
        Ok(self
            .dal
            .notification_job()
            .claim(worker_id, limit, visibility_timeout, Utc::now())
            .await?)
    }

    /// Settles a successfully processed job. Returns `false` when the claim
    /// had lapsed and the job was left to whoever holds it now.
    pub async fn complete(&self, job: &NotificationJobRecord) -> Result<bool, QueueError> {
        let settled = self.dal.notification_job().complete(job).await?;
        if !settled {
            warn!(job_id = job.id, job = %job.job_name, "claim lapsed before completion");
        }
        Ok(settled)
    }

    /// Settles a failed attempt: schedules a retry with backoff, or dead-letters
    /// the job once its attempts are used up.
    pub async fn fail(
        &self,
        job: &NotificationJobRecord,
        error: &str,
    ) -> Result<FailureDisposition, QueueError> {
        if job.is_final_attempt() {
            return Ok(self.dead_letter(job, error).await);
        }

        let delay = job.backoff.delay_for(job.attempts_made.max(1) as u32);
        let retry_at = Utc::now() + crate::dal::chrono_duration(delay);
        let released = self
            .dal
            .notification_job()
            .schedule_retry(job, error, retry_at)
            .await?;
        if !released {
            warn!(
                job_id = job.id,
                job = %job.job_name,
                "claim lapsed before retry was scheduled"
            );
            return Ok(FailureDisposition::ClaimLost);
        }

        info!(
            job_id = job.id,
            job = %job.job_name,
            attempt = job.attempts_made,
            max_attempts = job.max_attempts,
            retry_in_ms = delay.as_millis() as u64,
            "job attempt failed, retry scheduled: {}",
            error
        );
        metrics::record_job_outcome(&job.job_name, "retried");
        Ok(FailureDisposition::Retried { retry_at })
    }

    /// Moves a job to the dead-letter table regardless of attempts left.
    ///
    /// If the dead-letter write fails the job is still removed from the queue
    /// so it can never trigger processing again.
    pub async fn dead_letter(&self, job: &NotificationJobRecord, error: &str) -> FailureDisposition {
        match self.dal.notification_job().dead_letter(job, error).await {
            Ok(failed) => {
                warn!(
                    job_id = job.id,
                    failed_job_id = failed.id,
                    job = %job.job_name,
                    attempts = job.attempts_made,
                    "job dead-lettered: {}",
                    error
                );
                metrics::record_job_outcome(&job.job_name, "dead_lettered");
                FailureDisposition::DeadLettered {
                    failed_job_id: failed.id,
                }
            }
            Err(write_error) => {
                error!(
                    job_id = job.id,
                    job = %job.job_name,
                    payload = %job.payload,
                    attempts = job.attempts_made,
                    job_error = %error,
                    "DEAD-LETTER WRITE FAILED, job is lost: {}",
                    write_error
                );
                metrics::record_dead_letter_write_failure(&job.job_name);
                self.discard(job.id).await;
                FailureDisposition::DeadLetterLost
            }
        }
    }

    async fn discard(&self, job_id: i64) {
        if let Err(e) = self.dal.notification_job().delete(job_id).await {
            error!(job_id, "failed to discard exhausted job: {}", e);
        }
    }

    pub async fn pending(&self) -> Result<Vec<NotificationJobRecord>, StoreError> {
        self.dal.notification_job().list_pending().await
    }
}
