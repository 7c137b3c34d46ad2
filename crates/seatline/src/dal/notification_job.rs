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

//! Notification job queue storage: enqueue, claiming, and retry scheduling.
//!
//! A job is claimable when it is not completed, its `available_at` has passed,
//! and it is not inside another worker's visibility window. Claiming bumps
//! `attempts_made` and sets `locked_until`; a worker that dies mid-job simply
//! lets the window lapse and the job becomes claimable again.
//!
//! Exhausted jobs move to `failed_jobs` in the same transaction that removes
//! them from the queue.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::time::Duration;

use super::models::{FailedJobRow, NewFailedJobRow, NewNotificationJobRow, NotificationJobRow};
use super::{chrono_duration, now_naive, DAL};
use crate::config::JobOptions;
use crate::database::schema::{failed_jobs, notification_jobs};
use crate::error::StoreError;
use crate::models::{FailedJob, NotificationJobRecord};

/// Input for enqueuing a job.
#[derive(Debug, Clone)]
pub struct NewNotificationJob {
    pub job_name: String,
    pub payload: String,
    pub options: JobOptions,
    pub available_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct NotificationJobDAL<'a> {
    dal: &'a DAL,
}

impl<'a> NotificationJobDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn create(&self, job: NewNotificationJob) -> Result<NotificationJobRecord, StoreError> {
        let row = NewNotificationJobRow {
            job_name: job.job_name,
            payload: job.payload,
            attempts_made: 0,
            max_attempts: job.options.attempts as i32,
            backoff_kind: job.options.backoff.kind().to_string(),
            backoff_delay_ms: job.options.backoff.base_delay().as_millis() as i64,
            remove_on_success: job.options.remove_on_success,
            available_at: job.available_at.naive_utc(),
            created_at: now_naive(),
        };

        let created: NotificationJobRow = crate::with_connection!(self.dal, |conn| {
            diesel::insert_into(notification_jobs::table)
                .values(&row)
                .returning(NotificationJobRow::as_returning())
                .get_result(conn)
        })?;

        created.try_into()
    }

    pub async fn get(&self, id: i64) -> Result<Option<NotificationJobRecord>, StoreError> {
        let row: Option<NotificationJobRow> = crate::with_connection!(self.dal, |conn| {
            notification_jobs::table
                .find(id)
                .select(NotificationJobRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(NotificationJobRecord::try_from).transpose()
    }

    /// Atomically claims up to `limit` ready jobs for `worker_id`.
    pub async fn claim(
        &self,
        worker_id: &str,
        limit: usize,
        visibility_timeout: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<NotificationJobRecord>, StoreError> {
        let worker_id = worker_id.to_string();
        let limit = limit as i64;
        let locked_until = now.naive_utc() + chrono_duration(visibility_timeout);
        let now = now.naive_utc();

        let mut rows = crate::dispatch_backend!(
            self.dal.backend(),
            self.claim_postgres(worker_id, limit, now, locked_until)
                .await?,
            self.claim_sqlite(worker_id, limit, now, locked_until)
                .await?
        );

        rows.sort_by(|a, b| a.available_at.cmp(&b.available_at).then(a.id.cmp(&b.id)));
        rows.into_iter().map(NotificationJobRecord::try_from).collect()
    }

    #[cfg(feature = "postgres")]
    async fn claim_postgres(
        &self,
        worker_id: String,
        limit: i64,
        now: chrono::NaiveDateTime,
        locked_until: chrono::NaiveDateTime,
    ) -> Result<Vec<NotificationJobRow>, StoreError> {
        use diesel::connection::Connection;

        let conn = self.dal.database.get_postgres_connection().await?;

        let rows = conn
            .interact(move |conn| {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    // Rows locked by a concurrent claimer are skipped rather
                    // than waited on.
                    let ids: Vec<i64> = notification_jobs::table
                        .filter(notification_jobs::completed_at.is_null())
                        .filter(notification_jobs::available_at.le(now))
                        .filter(
                            notification_jobs::locked_until
                                .is_null()
                                .or(notification_jobs::locked_until.lt(now)),
                        )
                        .order((
                            notification_jobs::available_at.asc(),
                            notification_jobs::id.asc(),
                        ))
                        .limit(limit)
                        .select(notification_jobs::id)
                        .for_update()
                        .skip_locked()
                        .load(conn)?;

                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(notification_jobs::table.filter(notification_jobs::id.eq_any(&ids)))
                        .set((
                            notification_jobs::attempts_made.eq(notification_jobs::attempts_made + 1),
                            notification_jobs::locked_by.eq(Some(worker_id)),
                            notification_jobs::locked_until.eq(Some(locked_until)),
                        ))
                        .returning(NotificationJobRow::as_returning())
                        .get_results(conn)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    #[cfg(feature = "sqlite")]
    async fn claim_sqlite(
        &self,
        worker_id: String,
        limit: i64,
        now: chrono::NaiveDateTime,
        locked_until: chrono::NaiveDateTime,
    ) -> Result<Vec<NotificationJobRow>, StoreError> {
        let conn = self.dal.database.get_sqlite_connection().await?;

        // SQLite has no SKIP LOCKED; an IMMEDIATE transaction holds the write
        // lock across the select and the update.
        let rows = conn
            .interact(move |conn| {
                conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                    let ids: Vec<i64> = notification_jobs::table
                        .filter(notification_jobs::completed_at.is_null())
                        .filter(notification_jobs::available_at.le(now))
                        .filter(
                            notification_jobs::locked_until
                                .is_null()
                                .or(notification_jobs::locked_until.lt(now)),
                        )
                        .order((
                            notification_jobs::available_at.asc(),
                            notification_jobs::id.asc(),
                        ))
                        .limit(limit)
                        .select(notification_jobs::id)
                        .load(conn)?;

                    if ids.is_empty() {
                        return Ok(Vec::new());
                    }

                    diesel::update(notification_jobs::table.filter(notification_jobs::id.eq_any(&ids)))
                        .set((
                            notification_jobs::attempts_made.eq(notification_jobs::attempts_made + 1),
                            notification_jobs::locked_by.eq(Some(worker_id)),
                            notification_jobs::locked_until.eq(Some(locked_until)),
                        ))
                        .returning(NotificationJobRow::as_returning())
                        .get_results(conn)
                })
            })
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Marks a job done: deletes it, or stamps `completed_at` when the job
    /// was enqueued with `remove_on_success = false`.
    ///
    /// Only the claim in `job` can settle it. Returns `false` when that claim
    /// lapsed and the job now belongs to another worker or is already gone.
    pub async fn complete(&self, job: &NotificationJobRecord) -> Result<bool, StoreError> {
        let id = job.id;
        let locked_by = job.locked_by.clone();
        let updated = if job.remove_on_success {
            crate::with_connection!(self.dal, |conn| {
                diesel::delete(
                    notification_jobs::table
                        .find(id)
                        .filter(notification_jobs::locked_by.eq(locked_by)),
                )
                .execute(conn)
            })?
        } else {
            let now = now_naive();
            crate::with_connection!(self.dal, |conn| {
                diesel::update(
                    notification_jobs::table
                        .find(id)
                        .filter(notification_jobs::locked_by.eq(locked_by)),
                )
                .set((
                    notification_jobs::completed_at.eq(Some(now)),
                    notification_jobs::locked_until.eq(None::<chrono::NaiveDateTime>),
                    notification_jobs::locked_by.eq(None::<String>),
                ))
                .execute(conn)
            })?
        };
        Ok(updated == 1)
    }

    /// Releases a failed attempt and makes the job claimable at `retry_at`.
    ///
    /// Like [`complete`](Self::complete), returns `false` when the claim in
    /// `job` no longer holds the job.
    pub async fn schedule_retry(
        &self,
        job: &NotificationJobRecord,
        error: &str,
        retry_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let id = job.id;
        let locked_by = job.locked_by.clone();
        let error = error.to_string();
        let retry_at = retry_at.naive_utc();
        let updated = crate::with_connection!(self.dal, |conn| {
            diesel::update(
                notification_jobs::table
                    .find(id)
                    .filter(notification_jobs::locked_by.eq(locked_by)),
            )
            .set((
                notification_jobs::available_at.eq(retry_at),
                notification_jobs::locked_until.eq(None::<chrono::NaiveDateTime>),
                notification_jobs::locked_by.eq(None::<String>),
                notification_jobs::last_error.eq(Some(error)),
            ))
            .execute(conn)
        })?;
        Ok(updated == 1)
    }

    /// Moves a job to `failed_jobs` and removes it from the queue, atomically.
    pub async fn dead_letter(
        &self,
        job: &NotificationJobRecord,
        error: &str,
    ) -> Result<FailedJob, StoreError> {
        use diesel::connection::Connection;

        let id = job.id;
        let failed = NewFailedJobRow {
            job_id: job.id,
            job_name: job.job_name.clone(),
            payload: job.payload.clone(),
            error: error.to_string(),
            attempts: job.attempts_made,
            failed_at: now_naive(),
        };

        let row: FailedJobRow = crate::with_connection!(self.dal, |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                let row = diesel::insert_into(failed_jobs::table)
                    .values(&failed)
                    .returning(FailedJobRow::as_returning())
                    .get_result(conn)?;
                diesel::delete(notification_jobs::table.find(id)).execute(conn)?;
                Ok(row)
            })
        })?;

        Ok(row.into())
    }

    /// Removes a job without recording it anywhere.
    pub async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        let deleted = crate::with_connection!(self.dal, |conn| {
            diesel::delete(notification_jobs::table.find(id)).execute(conn)
        })?;
        Ok(deleted == 1)
    }

    /// Jobs not yet completed, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<NotificationJobRecord>, StoreError> {
        let rows: Vec<NotificationJobRow> = crate::with_connection!(self.dal, |conn| {
            notification_jobs::table
                .filter(notification_jobs::completed_at.is_null())
                .order(notification_jobs::id.asc())
                .select(NotificationJobRow::as_select())
                .load(conn)
        })?;

        rows.into_iter().map(NotificationJobRecord::try_from).collect()
    }
}
