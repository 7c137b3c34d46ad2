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

//! Periodic background work.
//!
//! The reminder scan and the maintenance sweeps each run as their own task on
//! their own schedule. A task never overlaps with itself: the next occurrence
//! is computed only after the current run returns, so an occurrence missed
//! while a run was still going is skipped rather than queued up.

use chrono::{DateTime, Utc};
use croner::Cron;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{parse_schedule, SchedulerConfig};
use crate::dal::{chrono_duration, DAL};
use crate::error::{ConfigError, QueueError};
use crate::lock::DistributedLock;
use crate::maintenance::MaintenanceSweeper;
use crate::metrics;
use crate::models::{NotificationJob, ReminderNotification};
use crate::queue::NotificationQueue;

/// Enqueues reminders for competitions that start soon.
#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    dal: DAL,
    queue: NotificationQueue,
    config: SchedulerConfig,
}

impl ReminderScheduler {
    pub fn new(dal: DAL, queue: NotificationQueue, config: SchedulerConfig) -> Self {
        Self { dal, queue, config }
    }

    /// Enqueues one reminder per active registration of every competition
    /// starting within the lookahead window after `now`. Returns the number
    /// of jobs enqueued.
    ///
    /// A reminder that cannot be enqueued is logged and counted; the scan
    /// carries on with the remaining participants.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let until = now + chrono_duration(self.config.reminder_lookahead());
        let competitions = self
            .dal
            .competition()
            .list_starting_between(now, until)
            .await?;

        let mut enqueued = 0;
        let mut failed = 0;
        for competition in competitions {
            let Some(start_at) = competition.start_at else {
                continue;
            };
            let participants = match self
                .dal
                .registration()
                .list_active_with_users(competition.id)
                .await
            {
                Ok(participants) => participants,
                Err(e) => {
                    error!(competition_id = competition.id, "failed to load participants: {}", e);
                    failed += 1;
                    continue;
                }
            };

            for (registration, user) in participants {
                let job = NotificationJob::ReminderNotification(ReminderNotification {
                    user_id: registration.user_id,
                    competition_id: competition.id,
                    user_email: user.email,
                    user_name: user.name,
                    competition_title: competition.title.clone(),
                    competition_start_date: start_at,
                });
                match self.queue.enqueue(&job, *self.config.reminder_job()).await {
                    Ok(_) => enqueued += 1,
                    Err(e) => {
                        metrics::record_job_enqueue_failure(job.name());
                        warn!(
                            competition_id = competition.id,
                            user_id = registration.user_id,
                            "failed to enqueue reminder: {}",
                            e
                        );
                        failed += 1;
                    }
                }
            }

            debug!(competition_id = competition.id, "reminders enqueued");
        }

        info!(enqueued, failed, window_end = %until, "reminder scan finished");
        Ok(enqueued)
    }
}

/// Spawns a task that runs `task` at every occurrence of `schedule` until
/// `shutdown` fires.
pub fn spawn_cron_task<F, Fut>(
    name: &'static str,
    schedule: Cron,
    mut shutdown: broadcast::Receiver<()>,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = match schedule.find_next_occurrence(&now, false) {
                Ok(next) => next,
                Err(e) => {
                    error!(task = name, "no next occurrence, stopping: {}", e);
                    return;
                }
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            debug!(task = name, next = %next, "next run scheduled");

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            task().await;
        }
        debug!(task = name, "periodic task stopped");
    })
}

/// Spawns a task that runs `task` every `period` until `shutdown` fires.
pub fn spawn_interval_task<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    task: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = interval.tick() => {}
            }
            task().await;
        }
        debug!(task = name, "periodic task stopped");
    })
}

/// The running set of periodic tasks.
#[derive(Debug)]
pub struct Scheduler {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Scheduler {
    /// Parses every schedule and spawns the reminder scan and the maintenance
    /// sweeps.
    pub fn start(
        dal: DAL,
        queue: NotificationQueue,
        lock: Arc<dyn DistributedLock>,
        config: SchedulerConfig,
    ) -> Result<Self, ConfigError> {
        let reminder_schedule = parse_schedule(config.reminder_schedule())?;
        let idempotency_schedule = parse_schedule(config.idempotency_sweep_schedule())?;
        let purge_schedule = parse_schedule(config.registration_purge_schedule())?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let reminders = ReminderScheduler::new(dal.clone(), queue, config.clone());
        let sweeper = MaintenanceSweeper::new(dal, lock);
        let retention = config.soft_delete_retention();

        let mut handles = Vec::with_capacity(4);

        handles.push(spawn_cron_task(
            "reminder_scan",
            reminder_schedule,
            shutdown_tx.subscribe(),
            move || {
                let reminders = reminders.clone();
                async move {
                    if let Err(e) = reminders.run_once(Utc::now()).await {
                        error!("reminder scan failed: {}", e);
                    }
                }
            },
        ));

        let idempotency_sweeper = sweeper.clone();
        handles.push(spawn_cron_task(
            "idempotency_sweep",
            idempotency_schedule,
            shutdown_tx.subscribe(),
            move || {
                let sweeper = idempotency_sweeper.clone();
                async move {
                    if let Err(e) = sweeper.purge_idempotency(Utc::now()).await {
                        error!("idempotency sweep failed: {}", e);
                    }
                }
            },
        ));

        let purge_sweeper = sweeper.clone();
        handles.push(spawn_cron_task(
            "registration_purge",
            purge_schedule,
            shutdown_tx.subscribe(),
            move || {
                let sweeper = purge_sweeper.clone();
                async move {
                    if let Err(e) = sweeper
                        .purge_registrations_older_than(Utc::now(), retention)
                        .await
                    {
                        error!("registration purge failed: {}", e);
                    }
                }
            },
        ));

        handles.push(spawn_interval_task(
            "lock_sweep",
            config.lock_sweep_interval(),
            shutdown_tx.subscribe(),
            move || {
                let sweeper = sweeper.clone();
                async move {
                    if let Err(e) = sweeper.purge_locks().await {
                        warn!("lock sweep failed: {}", e);
                    }
                }
            },
        ));

        info!(tasks = handles.len(), "scheduler started");
        Ok(Self {
            handles,
            shutdown_tx,
        })
    }

    /// Stops every task. A run already in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("scheduler task panicked: {}", e);
            }
        }
        info!("scheduler stopped");
    }
}
