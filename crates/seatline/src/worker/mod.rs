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

//! Notification worker.
//!
//! A worker claims batches of jobs, re-checks each job's precondition against
//! current state, and hands composed messages to a [`DeliveryChannel`]. Jobs
//! whose precondition no longer holds complete as [`JobOutcome::Skipped`]
//! without delivering anything. Delivery errors go back to the queue, which
//! retries or dead-letters them.

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::dal::DAL;
use crate::error::{DeliveryError, WorkerError};
use crate::metrics;
use crate::models::{NotificationJob, NotificationJobRecord};
use crate::queue::{FailureDisposition, NotificationQueue};

mod channel;
pub mod mail;
mod pool;

pub use channel::{DeliveryChannel, MailboxChannel};
pub use pool::WorkerPool;

/// Result of processing a decoded job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// A message was delivered.
    Success { message_id: String },
    /// The job's precondition no longer holds; nothing was delivered.
    Skipped { reason: String },
}

impl JobOutcome {
    fn skipped(reason: &str) -> Self {
        JobOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    fn metric_label(&self) -> &'static str {
        match self {
            JobOutcome::Success { .. } => "completed",
            JobOutcome::Skipped { .. } => "skipped",
        }
    }
}

/// How a claimed job was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobDisposition {
    Completed(JobOutcome),
    Failed(FailureDisposition),
}

#[derive(Debug, Clone)]
pub struct NotificationWorker {
    dal: DAL,
    queue: NotificationQueue,
    channel: Arc<dyn DeliveryChannel>,
    config: WorkerConfig,
    worker_id: String,
}

impl NotificationWorker {
    pub fn new(
        dal: DAL,
        queue: NotificationQueue,
        channel: Arc<dyn DeliveryChannel>,
        config: WorkerConfig,
    ) -> Self {
        let worker_id = config
            .worker_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4().simple()));
        Self {
            dal,
            queue,
            channel,
            config,
            worker_id,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn queue(&self) -> &NotificationQueue {
        &self.queue
    }

    /// A copy of this worker with a distinct identity, for running several
    /// loops side by side.
    pub(crate) fn with_worker_id(&self, worker_id: String) -> Self {
        Self {
            worker_id,
            ..self.clone()
        }
    }

    /// Re-checks the job's precondition and delivers its message.
    pub async fn process(&self, job: &NotificationJob) -> Result<JobOutcome, DeliveryError> {
        match job {
            NotificationJob::RegistrationConfirmation(p) => {
                let registration = self.dal.registration().get(p.registration_id).await?;
                if !registration.is_some_and(|r| r.is_active()) {
                    return Ok(JobOutcome::skipped("registration_not_found"));
                }
            }
            NotificationJob::ReminderNotification(p) => {
                let registration = self
                    .dal
                    .registration()
                    .find_active(p.competition_id, p.user_id)
                    .await?;
                if registration.is_none() {
                    return Ok(JobOutcome::skipped("not_registered"));
                }
            }
        }

        let message_id = self.channel.deliver(mail::compose(job)).await?;
        Ok(JobOutcome::Success { message_id })
    }

    /// Processes one claimed job and settles it with the queue.
    pub async fn handle(&self, record: NotificationJobRecord) -> Result<JobDisposition, WorkerError> {
        // Reclaimed after a worker died during its final attempt.
        if record.attempts_made > record.max_attempts {
            let reason = record
                .last_error
                .clone()
                .unwrap_or_else(|| "attempts exhausted without completion".to_string());
            let disposition = self.queue.dead_letter(&record, &reason).await;
            return Ok(JobDisposition::Failed(disposition));
        }

        let job = match NotificationJob::decode(&record.job_name, &record.payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id = record.id, job = %record.job_name, "undecodable job: {}", e);
                let disposition = self.queue.dead_letter(&record, &e.to_string()).await;
                return Ok(JobDisposition::Failed(disposition));
            }
        };

        debug!(
            job_id = record.id,
            job = job.name(),
            attempt = record.attempts_made,
            worker_id = %self.worker_id,
            "processing job"
        );

        match self.process(&job).await {
            Ok(outcome) => {
                self.queue.complete(&record).await?;
                match &outcome {
                    JobOutcome::Success { message_id } => {
                        info!(job_id = record.id, job = job.name(), message_id = %message_id, "job completed")
                    }
                    JobOutcome::Skipped { reason } => {
                        info!(job_id = record.id, job = job.name(), reason = %reason, "job skipped")
                    }
                }
                metrics::record_job_outcome(job.name(), outcome.metric_label());
                Ok(JobDisposition::Completed(outcome))
            }
            Err(e) => {
                let disposition = self.queue.fail(&record, &e.to_string()).await?;
                Ok(JobDisposition::Failed(disposition))
            }
        }
    }

    /// Claims and handles one batch. Returns the number of jobs claimed.
    ///
    /// A job whose settlement fails stays claimed and becomes visible again
    /// once its visibility timeout lapses.
    pub async fn run_once(&self) -> Result<usize, WorkerError> {
        let batch = self
            .queue
            .claim(
                &self.worker_id,
                self.config.batch_size(),
                self.config.visibility_timeout(),
            )
            .await?;
        let claimed = batch.len();

        for record in batch {
            let job_id = record.id;
            if let Err(e) = self.handle(record).await {
                error!(job_id, worker_id = %self.worker_id, "failed to settle job: {}", e);
            }
        }

        Ok(claimed)
    }

    /// Runs until `shutdown` fires or its sender is dropped.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(worker_id = %self.worker_id, "notification worker started");
        let distributor = self.queue.distributor();

        loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            let claimed = match self.run_once().await {
                Ok(claimed) => claimed,
                Err(e) => {
                    error!(worker_id = %self.worker_id, "failed to claim jobs: {}", e);
                    0
                }
            };
            if claimed > 0 {
                continue;
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = distributor.wait_for_work() => {}
            }
        }

        info!(worker_id = %self.worker_id, "notification worker stopped");
    }
}
