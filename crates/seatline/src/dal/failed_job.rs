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

//! Read-only access to the dead-letter table, plus the direct insert used when
//! a job never made it into the queue.

use diesel::prelude::*;

use super::models::{FailedJobRow, NewFailedJobRow};
use super::{now_naive, DAL};
use crate::database::schema::failed_jobs;
use crate::error::StoreError;
use crate::models::{FailedJob, NewFailedJob};

#[derive(Clone)]
pub struct FailedJobDAL<'a> {
    dal: &'a DAL,
}

impl<'a> FailedJobDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn create(&self, failed: NewFailedJob) -> Result<FailedJob, StoreError> {
        let row = NewFailedJobRow {
            job_id: failed.job_id,
            job_name: failed.job_name,
            payload: failed.payload,
            error: failed.error,
            attempts: failed.attempts,
            failed_at: now_naive(),
        };

        let created: FailedJobRow = crate::with_connection!(self.dal, |conn| {
            diesel::insert_into(failed_jobs::table)
                .values(&row)
                .returning(FailedJobRow::as_returning())
                .get_result(conn)
        })?;

        Ok(created.into())
    }

    pub async fn get(&self, id: i64) -> Result<Option<FailedJob>, StoreError> {
        let row: Option<FailedJobRow> = crate::with_connection!(self.dal, |conn| {
            failed_jobs::table
                .find(id)
                .select(FailedJobRow::as_select())
                .first(conn)
                .optional()
        })?;
        Ok(row.map(FailedJob::from))
    }

    /// Dead-lettered jobs, most recent failure first.
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<FailedJob>, StoreError> {
        let rows: Vec<FailedJobRow> = crate::with_connection!(self.dal, |conn| {
            failed_jobs::table
                .order((failed_jobs::failed_at.desc(), failed_jobs::id.desc()))
                .limit(limit)
                .offset(offset)
                .select(FailedJobRow::as_select())
                .load(conn)
        })?;
        Ok(rows.into_iter().map(FailedJob::from).collect())
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count: i64 = crate::with_connection!(self.dal, |conn| {
            failed_jobs::table.count().get_result(conn)
        })?;
        Ok(count)
    }
}
