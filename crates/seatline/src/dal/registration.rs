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

//! Registration persistence, including the guarded registration transaction.
//!
//! [`RegistrationDAL::register_participant`] is the only linearization point
//! for seat allocation. Everything it checks (existence, deadline, capacity,
//! duplicate registration, idempotency key ownership) is read and written in
//! one transaction:
//!
//! - PostgreSQL runs it at `SERIALIZABLE` with a `statement_timeout`. Racing
//!   transactions either serialize cleanly or one of them aborts with a
//!   serialization failure, which the caller may retry.
//! - SQLite runs it under `BEGIN IMMEDIATE`, which takes the database write
//!   lock up front and so trivially serializes writers.
//!
//! The partial unique index on `(competition_id, user_id) WHERE deleted_at IS
//! NULL` backs the duplicate check if a race slips past the read.
//!
//! A [`TransactionDeadline`] is enforced inside the transaction itself: once it
//! has passed, the body rolls back before the insert or before the commit. The
//! caller always learns what the database actually did.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::time::{Duration, Instant};

use super::models::{
    utc, CompetitionRow, IdempotencyRow, NewRegistrationRow, RegistrationRow, UserRow,
};
use super::{chrono_duration, DAL};
use crate::database::schema::{competitions, idempotency_keys, registrations, users};
use crate::error::{RegistrationError, StoreError};
use crate::models::{
    RegisteredParticipant, Registration, RegistrationResponse, RegistrationStatus, User,
};

/// Write-once idempotency record to store inside the registration transaction.
#[derive(Debug, Clone)]
pub struct IdempotencyWrite {
    pub key: String,
    pub ttl: Duration,
}

/// Wall-clock bound on a registration transaction.
#[derive(Debug, Clone, Copy)]
pub struct TransactionDeadline {
    pub at: Instant,
    /// The budget the deadline was derived from, reported when it is missed.
    pub timeout: Duration,
}

impl TransactionDeadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Parameters of one registration transaction.
#[derive(Debug, Clone)]
pub struct RegistrationAttempt {
    pub competition_id: i64,
    pub user_id: i64,
    /// Instant the deadline is checked against and the registration is stamped
    /// with.
    pub at: DateTime<Utc>,
    pub idempotency: Option<IdempotencyWrite>,
    /// Bounds the whole transaction. On PostgreSQL the remaining time also
    /// becomes the `statement_timeout`.
    pub deadline: Option<TransactionDeadline>,
}

impl RegistrationAttempt {
    pub fn new(competition_id: i64, user_id: i64) -> Self {
        Self {
            competition_id,
            user_id,
            at: Utc::now(),
            idempotency: None,
            deadline: None,
        }
    }

    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = at;
        self
    }

    pub fn with_idempotency(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.idempotency = Some(IdempotencyWrite {
            key: key.into(),
            ttl,
        });
        self
    }

    pub fn with_deadline(mut self, deadline: TransactionDeadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    fn out_of_time(&self) -> bool {
        self.deadline.is_some_and(|d| d.has_passed())
    }
}

/// A committed registration and the response body stored for it.
#[derive(Debug, Clone)]
pub struct RegistrationCommit {
    pub participant: RegisteredParticipant,
    /// Canonical JSON of the [`RegistrationResponse`]. Identical to the stored
    /// idempotency response when a key was supplied.
    pub response_body: String,
}

/// Outcomes that abort the registration transaction.
#[derive(Debug)]
enum Rejection {
    NotFound,
    UnknownUser,
    DeadlinePassed,
    CapacityExceeded { capacity: i32 },
    AlreadyRegistered,
    KeyTaken { key: String },
    Timeout,
    Encode(serde_json::Error),
    Database(diesel::result::Error),
    Store(StoreError),
}

impl From<diesel::result::Error> for Rejection {
    fn from(e: diesel::result::Error) -> Self {
        Rejection::Database(e)
    }
}

struct Committed {
    registration: RegistrationRow,
    competition_title: String,
    user: UserRow,
    response_body: String,
}

/// The body of the registration transaction, shared by both backends.
macro_rules! guarded_registration {
    ($conn:ident, $attempt:expr) => {{
        let attempt: &RegistrationAttempt = $attempt;
        let now = attempt.at.naive_utc();

        if attempt.out_of_time() {
            return Err(Rejection::Timeout);
        }

        // A key committed by a racing request wins over every other outcome,
        // so the caller can replay it.
        if let Some(idempotency) = &attempt.idempotency {
            let taken: i64 = idempotency_keys::table
                .filter(idempotency_keys::key.eq(&idempotency.key))
                .count()
                .get_result($conn)?;
            if taken > 0 {
                return Err(Rejection::KeyTaken {
                    key: idempotency.key.clone(),
                });
            }
        }

        let competition: CompetitionRow = competitions::table
            .find(attempt.competition_id)
            .select(CompetitionRow::as_select())
            .first($conn)
            .optional()?
            .ok_or(Rejection::NotFound)?;

        let user: UserRow = users::table
            .find(attempt.user_id)
            .select(UserRow::as_select())
            .first($conn)
            .optional()?
            .ok_or(Rejection::UnknownUser)?;

        if now > competition.registration_deadline {
            return Err(Rejection::DeadlinePassed);
        }

        let registered: i64 = registrations::table
            .filter(registrations::competition_id.eq(attempt.competition_id))
            .filter(registrations::deleted_at.is_null())
            .count()
            .get_result($conn)?;
        if competition.capacity as i64 - registered <= 0 {
            return Err(Rejection::CapacityExceeded {
                capacity: competition.capacity,
            });
        }

        let existing: i64 = registrations::table
            .filter(registrations::competition_id.eq(attempt.competition_id))
            .filter(registrations::user_id.eq(attempt.user_id))
            .filter(registrations::deleted_at.is_null())
            .count()
            .get_result($conn)?;
        if existing > 0 {
            return Err(Rejection::AlreadyRegistered);
        }

        if attempt.out_of_time() {
            return Err(Rejection::Timeout);
        }

        let registration: RegistrationRow = diesel::insert_into(registrations::table)
            .values(&NewRegistrationRow {
                competition_id: attempt.competition_id,
                user_id: attempt.user_id,
                status: RegistrationStatus::Confirmed.as_str().to_string(),
                created_at: now,
            })
            .returning(RegistrationRow::as_returning())
            .get_result($conn)?;

        let response = RegistrationResponse {
            id: registration.id,
            competition_id: registration.competition_id,
            user_id: registration.user_id,
            registered_at: utc(registration.created_at),
            competition_title: competition.title.clone(),
        };
        let response_body = serde_json::to_string(&response).map_err(Rejection::Encode)?;

        if let Some(idempotency) = &attempt.idempotency {
            diesel::insert_into(idempotency_keys::table)
                .values(&IdempotencyRow {
                    key: idempotency.key.clone(),
                    response: response_body.clone(),
                    expires_at: now + chrono_duration(idempotency.ttl),
                    created_at: now,
                })
                .execute($conn)?;
        }

        if attempt.out_of_time() {
            return Err(Rejection::Timeout);
        }

        Ok(Committed {
            registration,
            competition_title: competition.title,
            user,
            response_body,
        })
    }};
}

#[derive(Clone)]
pub struct RegistrationDAL<'a> {
    dal: &'a DAL,
}

impl<'a> RegistrationDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Runs the guarded registration transaction.
    ///
    /// On success the registration (and the idempotency record, if requested)
    /// is committed. Every rejection rolls the whole transaction back.
    pub async fn register_participant(
        &self,
        attempt: RegistrationAttempt,
    ) -> Result<RegistrationCommit, RegistrationError> {
        let competition_id = attempt.competition_id;
        let user_id = attempt.user_id;
        let key = attempt.idempotency.as_ref().map(|i| i.key.clone());
        let timeout = attempt.deadline.map(|d| d.timeout);

        let result = crate::dispatch_backend!(
            self.dal.backend(),
            self.register_participant_postgres(attempt).await,
            self.register_participant_sqlite(attempt).await
        );

        let committed = result.map_err(|rejection| match rejection {
            Rejection::NotFound => RegistrationError::NotFound { competition_id },
            Rejection::UnknownUser => RegistrationError::UnknownUser { user_id },
            Rejection::DeadlinePassed => RegistrationError::DeadlinePassed { competition_id },
            Rejection::CapacityExceeded { capacity } => RegistrationError::CapacityExceeded {
                competition_id,
                capacity,
            },
            Rejection::AlreadyRegistered => RegistrationError::AlreadyRegistered {
                competition_id,
                user_id,
            },
            Rejection::KeyTaken { key } => RegistrationError::Conflict { key },
            Rejection::Timeout => RegistrationError::TransactionTimeout {
                timeout: timeout.unwrap_or_default(),
            },
            Rejection::Encode(e) => RegistrationError::Store(StoreError::Serialization(e)),
            Rejection::Store(e) => RegistrationError::Store(e),
            Rejection::Database(e) => {
                classify_database_error(e, competition_id, user_id, key, timeout)
            }
        })?;

        let user = User::try_from(committed.user)?;
        Ok(RegistrationCommit {
            participant: RegisteredParticipant {
                registration: committed.registration.try_into()?,
                competition_title: committed.competition_title,
                user_email: user.email,
                user_name: user.name,
            },
            response_body: committed.response_body,
        })
    }

    #[cfg(feature = "postgres")]
    async fn register_participant_postgres(
        &self,
        attempt: RegistrationAttempt,
    ) -> Result<Committed, Rejection> {
        let conn = self
            .dal
            .database
            .get_postgres_connection()
            .await
            .map_err(Rejection::Store)?;

        conn.interact(move |conn| {
            conn.build_transaction()
                .serializable()
                .run::<_, Rejection, _>(|conn| {
                    if let Some(deadline) = attempt.deadline {
                        diesel::sql_query(format!(
                            "SET LOCAL statement_timeout = {}",
                            deadline.remaining().as_millis().max(1)
                        ))
                        .execute(conn)?;
                    }
                    guarded_registration!(conn, &attempt)
                })
        })
        .await
        .map_err(|e| Rejection::Store(StoreError::ConnectionPool(e.to_string())))?
    }

    #[cfg(feature = "sqlite")]
    async fn register_participant_sqlite(
        &self,
        attempt: RegistrationAttempt,
    ) -> Result<Committed, Rejection> {
        let conn = self
            .dal
            .database
            .get_sqlite_connection()
            .await
            .map_err(Rejection::Store)?;

        conn.interact(move |conn| {
            conn.immediate_transaction::<_, Rejection, _>(|conn| {
                guarded_registration!(conn, &attempt)
            })
        })
        .await
        .map_err(|e| Rejection::Store(StoreError::ConnectionPool(e.to_string())))?
    }

    pub async fn get(&self, id: i64) -> Result<Option<Registration>, StoreError> {
        let row: Option<RegistrationRow> = crate::with_connection!(self.dal, |conn| {
            registrations::table
                .find(id)
                .select(RegistrationRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(Registration::try_from).transpose()
    }

    /// The non-deleted registration of a user for a competition, if any.
    pub async fn find_active(
        &self,
        competition_id: i64,
        user_id: i64,
    ) -> Result<Option<Registration>, StoreError> {
        let row: Option<RegistrationRow> = crate::with_connection!(self.dal, |conn| {
            registrations::table
                .filter(registrations::competition_id.eq(competition_id))
                .filter(registrations::user_id.eq(user_id))
                .filter(registrations::deleted_at.is_null())
                .select(RegistrationRow::as_select())
                .first(conn)
                .optional()
        })?;

        row.map(Registration::try_from).transpose()
    }

    /// Number of non-deleted registrations for a competition.
    pub async fn count_active(&self, competition_id: i64) -> Result<i64, StoreError> {
        let count: i64 = crate::with_connection!(self.dal, |conn| {
            registrations::table
                .filter(registrations::competition_id.eq(competition_id))
                .filter(registrations::deleted_at.is_null())
                .count()
                .get_result(conn)
        })?;
        Ok(count)
    }

    /// Non-deleted registrations of a competition with their users.
    pub async fn list_active_with_users(
        &self,
        competition_id: i64,
    ) -> Result<Vec<(Registration, User)>, StoreError> {
        let rows: Vec<(RegistrationRow, UserRow)> = crate::with_connection!(self.dal, |conn| {
            registrations::table
                .inner_join(users::table)
                .filter(registrations::competition_id.eq(competition_id))
                .filter(registrations::deleted_at.is_null())
                .order(registrations::id.asc())
                .select((RegistrationRow::as_select(), UserRow::as_select()))
                .load(conn)
        })?;

        rows.into_iter()
            .map(|(registration, user)| Ok((registration.try_into()?, user.try_into()?)))
            .collect()
    }

    /// A user's non-deleted registrations, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Registration>, StoreError> {
        let rows: Vec<RegistrationRow> = crate::with_connection!(self.dal, |conn| {
            registrations::table
                .filter(registrations::user_id.eq(user_id))
                .filter(registrations::deleted_at.is_null())
                .order((registrations::created_at.desc(), registrations::id.desc()))
                .select(RegistrationRow::as_select())
                .load(conn)
        })?;

        rows.into_iter().map(Registration::try_from).collect()
    }

    /// Soft-deletes a user's active registration, freeing the seat.
    ///
    /// Returns the withdrawn registration, or `None` if there was nothing to
    /// withdraw.
    pub async fn withdraw(
        &self,
        competition_id: i64,
        user_id: i64,
    ) -> Result<Option<Registration>, StoreError> {
        let now = super::now_naive();
        let rows: Vec<RegistrationRow> = crate::with_connection!(self.dal, |conn| {
            diesel::update(
                registrations::table
                    .filter(registrations::competition_id.eq(competition_id))
                    .filter(registrations::user_id.eq(user_id))
                    .filter(registrations::deleted_at.is_null()),
            )
            .set(registrations::deleted_at.eq(Some(now)))
            .returning(RegistrationRow::as_returning())
            .get_results(conn)
        })?;

        rows.into_iter()
            .next()
            .map(Registration::try_from)
            .transpose()
    }

    pub async fn count_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        let cutoff = cutoff.naive_utc();
        let count: i64 = crate::with_connection!(self.dal, |conn| {
            registrations::table
                .filter(registrations::deleted_at.lt(cutoff))
                .count()
                .get_result(conn)
        })?;
        Ok(count)
    }

    /// Hard-deletes registrations soft-deleted before `cutoff`.
    pub async fn purge_deleted_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let cutoff = cutoff.naive_utc();
        let deleted = crate::with_connection!(self.dal, |conn| {
            diesel::delete(registrations::table.filter(registrations::deleted_at.lt(cutoff)))
                .execute(conn)
        })?;
        Ok(deleted)
    }
}

/// Maps database failures that escaped the transaction body.
///
/// Unique violations mean a concurrent transaction won a race the reads could
/// not see; serialization failures mean the transaction may be re-run. A
/// cancelled statement means the deadline ran out on the server side.
fn classify_database_error(
    e: diesel::result::Error,
    competition_id: i64,
    user_id: i64,
    key: Option<String>,
    timeout: Option<Duration>,
) -> RegistrationError {
    use diesel::result::{DatabaseErrorKind, Error};

    match e {
        Error::DatabaseError(_, ref info)
            if timeout.is_some() && info.message().contains("statement timeout") =>
        {
            RegistrationError::TransactionTimeout {
                timeout: timeout.unwrap_or_default(),
            }
        }
        Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            let constraint = info.constraint_name().unwrap_or_default();
            if constraint.contains("idempotency") || info.message().contains("idempotency") {
                RegistrationError::Conflict {
                    key: key.unwrap_or_default(),
                }
            } else {
                RegistrationError::AlreadyRegistered {
                    competition_id,
                    user_id,
                }
            }
        }
        other => RegistrationError::Store(StoreError::Database(other)),
    }
}
