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

//! Competition records and seat accounting reads.

use chrono::{DateTime, Utc};
use diesel::prelude::*;

use super::models::{CompetitionRow, NewCompetitionRow};
use super::{now_naive, DAL};
use crate::database::schema::{competitions, registrations};
use crate::error::StoreError;
use crate::models::{Competition, CompetitionDetail, NewCompetition};

#[derive(Clone)]
pub struct CompetitionDAL<'a> {
    dal: &'a DAL,
}

impl<'a> CompetitionDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Validates and inserts a competition.
    pub async fn create(&self, new_competition: NewCompetition) -> Result<Competition, StoreError> {
        let new_competition = new_competition.validate()?;
        let row = NewCompetitionRow {
            title: new_competition.title,
            description: new_competition.description,
            tags: serde_json::to_string(&new_competition.tags)?,
            capacity: new_competition.capacity,
            registration_deadline: new_competition.registration_deadline.naive_utc(),
            start_at: new_competition.start_at.map(|t| t.naive_utc()),
            organizer_id: new_competition.organizer_id,
            created_at: now_naive(),
        };

        let created: CompetitionRow = crate::with_connection!(self.dal, |conn| {
            diesel::insert_into(competitions::table)
                .values(&row)
                .returning(CompetitionRow::as_returning())
                .get_result(conn)
        })?;

        created.try_into()
    }

    pub async fn get(&self, id: i64) -> Result<Option<Competition>, StoreError> {
        let row: Option<CompetitionRow> = crate::with_connection!(self.dal, |conn| {
            competitions::table
                .find(id)
                .select(CompetitionRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(Competition::try_from).transpose()
    }

    /// Loads a competition with its current non-deleted registration count.
    ///
    /// The count is read outside any registration transaction and may be stale
    /// by the time the caller acts on it.
    pub async fn get_detail(&self, id: i64) -> Result<Option<CompetitionDetail>, StoreError> {
        let found: Option<(CompetitionRow, i64)> = crate::with_connection!(self.dal, |conn| {
            let Some(row) = competitions::table
                .find(id)
                .select(CompetitionRow::as_select())
                .first(conn)
                .optional()?
            else {
                return Ok(None);
            };
            let count: i64 = registrations::table
                .filter(registrations::competition_id.eq(id))
                .filter(registrations::deleted_at.is_null())
                .count()
                .get_result(conn)?;
            Ok::<_, diesel::result::Error>(Some((row, count)))
        })?;

        match found {
            Some((row, count)) => Ok(Some(CompetitionDetail::new(row.try_into()?, count))),
            None => Ok(None),
        }
    }

    /// Competitions whose start falls within `[from, to]`, earliest first.
    pub async fn list_starting_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Competition>, StoreError> {
        let (from, to) = (from.naive_utc(), to.naive_utc());
        let rows: Vec<CompetitionRow> = crate::with_connection!(self.dal, |conn| {
            competitions::table
                .filter(competitions::start_at.ge(from))
                .filter(competitions::start_at.le(to))
                .order(competitions::start_at.asc())
                .select(CompetitionRow::as_select())
                .load(conn)
        })?;

        rows.into_iter().map(Competition::try_from).collect()
    }
}
