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

//! Idempotency key rows.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::time::Duration;

use super::models::IdempotencyRow;
use super::{chrono_duration, now_naive, DAL};
use crate::database::schema::idempotency_keys;
use crate::error::StoreError;
use crate::models::IdempotencyRecord;

#[derive(Clone)]
pub struct IdempotencyDAL<'a> {
    dal: &'a DAL,
}

impl<'a> IdempotencyDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Reads a record regardless of expiry.
    pub async fn get(&self, key: &str) -> Result<Option<IdempotencyRecord>, StoreError> {
        let key = key.to_string();
        let row: Option<IdempotencyRow> = crate::with_connection!(self.dal, |conn| {
            idempotency_keys::table
                .find(key)
                .select(IdempotencyRow::as_select())
                .first(conn)
                .optional()
        })?;

        Ok(row.map(IdempotencyRecord::from))
    }

    /// Inserts a record unless the key already exists.
    ///
    /// Returns `false` when another writer got there first; the existing row is
    /// left untouched.
    pub async fn insert_if_absent(
        &self,
        key: &str,
        response: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = now_naive();
        let row = IdempotencyRow {
            key: key.to_string(),
            response: response.to_string(),
            expires_at: now + chrono_duration(ttl),
            created_at: now,
        };

        let inserted = crate::with_connection!(self.dal, |conn| {
            diesel::insert_into(idempotency_keys::table)
                .values(&row)
                .on_conflict_do_nothing()
                .execute(conn)
        })?;

        Ok(inserted == 1)
    }

    /// Records that [`purge_expired`](Self::purge_expired) would delete.
    pub async fn count_expired(&self, now: DateTime<Utc>) -> Result<i64, StoreError> {
        let now = now.naive_utc();
        let count: i64 = crate::with_connection!(self.dal, |conn| {
            idempotency_keys::table
                .filter(idempotency_keys::expires_at.lt(now))
                .count()
                .get_result(conn)
        })?;
        Ok(count)
    }

    /// Deletes records that expired before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let now = now.naive_utc();
        let deleted = crate::with_connection!(self.dal, |conn| {
            diesel::delete(idempotency_keys::table.filter(idempotency_keys::expires_at.lt(now)))
                .execute(conn)
        })?;
        Ok(deleted)
    }
}
