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

//! Lock rows backing the database lock store.
//!
//! Acquisition is a single transaction that drops an expired row for the key
//! and then inserts with `ON CONFLICT DO NOTHING`; exactly one concurrent
//! inserter sees an affected row. Release deletes only when the token still
//! matches.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::time::Duration;

use super::models::LockRow;
use super::{chrono_duration, DAL};
use crate::database::schema::competition_locks;
use crate::error::StoreError;

#[derive(Clone)]
pub struct LockDAL<'a> {
    dal: &'a DAL,
}

impl<'a> LockDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    pub async fn try_acquire(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let now = now.naive_utc();
        let row = LockRow {
            key: key.to_string(),
            token: token.to_string(),
            expires_at: now + chrono_duration(ttl),
        };

        let inserted = crate::with_connection!(self.dal, |conn| {
            conn.transaction::<_, diesel::result::Error, _>(|conn| {
                diesel::delete(
                    competition_locks::table
                        .filter(competition_locks::key.eq(&row.key))
                        .filter(competition_locks::expires_at.le(now)),
                )
                .execute(conn)?;

                diesel::insert_into(competition_locks::table)
                    .values(&row)
                    .on_conflict_do_nothing()
                    .execute(conn)
            })
        })?;

        Ok(inserted == 1)
    }

    /// Deletes the lock only if `token` still holds it.
    pub async fn release(&self, key: &str, token: &str) -> Result<bool, StoreError> {
        let (key, token) = (key.to_string(), token.to_string());
        let deleted = crate::with_connection!(self.dal, |conn| {
            diesel::delete(
                competition_locks::table
                    .filter(competition_locks::key.eq(key))
                    .filter(competition_locks::token.eq(token)),
            )
            .execute(conn)
        })?;
        Ok(deleted == 1)
    }

    pub async fn get(&self, key: &str) -> Result<Option<LockRow>, StoreError> {
        let key = key.to_string();
        let row = crate::with_connection!(self.dal, |conn| {
            competition_locks::table
                .find(key)
                .select(LockRow::as_select())
                .first(conn)
                .optional()
        })?;
        Ok(row)
    }

    /// Deletes lock rows whose TTL elapsed before `now`.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let now = now.naive_utc();
        let deleted = crate::with_connection!(self.dal, |conn| {
            diesel::delete(competition_locks::table.filter(competition_locks::expires_at.le(now)))
                .execute(conn)
        })?;
        Ok(deleted)
    }
}
