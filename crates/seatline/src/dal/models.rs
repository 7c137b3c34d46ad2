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

//! Diesel row structs and their conversions into domain types.
//!
//! Rows use naive UTC timestamps and string-encoded enums so the same struct
//! loads from either backend.

use chrono::{DateTime, NaiveDateTime, Utc};
use diesel::prelude::*;
use std::time::Duration;

use crate::config::Backoff;
use crate::database::schema::{
    competition_locks, competitions, failed_jobs, idempotency_keys, mailbox, notification_jobs,
    registrations, users,
};
use crate::error::StoreError;
use crate::models::{
    Competition, FailedJob, IdempotencyRecord, MailboxMessage, NotificationJobRecord,
    Registration, User,
};

pub(crate) fn utc(naive: NaiveDateTime) -> DateTime<Utc> {
    naive.and_utc()
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUserRow {
    pub email: String,
    pub name: String,
    pub role: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            role: row.role.parse()?,
            created_at: utc(row.created_at),
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = competitions)]
pub struct CompetitionRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub tags: String,
    pub capacity: i32,
    pub registration_deadline: NaiveDateTime,
    pub start_at: Option<NaiveDateTime>,
    pub organizer_id: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = competitions)]
pub struct NewCompetitionRow {
    pub title: String,
    pub description: String,
    pub tags: String,
    pub capacity: i32,
    pub registration_deadline: NaiveDateTime,
    pub start_at: Option<NaiveDateTime>,
    pub organizer_id: i64,
    pub created_at: NaiveDateTime,
}

impl TryFrom<CompetitionRow> for Competition {
    type Error = StoreError;

    fn try_from(row: CompetitionRow) -> Result<Self, Self::Error> {
        Ok(Competition {
            id: row.id,
            title: row.title,
            description: row.description,
            tags: serde_json::from_str(&row.tags)?,
            capacity: row.capacity,
            registration_deadline: utc(row.registration_deadline),
            start_at: row.start_at.map(utc),
            organizer_id: row.organizer_id,
            created_at: utc(row.created_at),
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = registrations)]
pub struct RegistrationRow {
    pub id: i64,
    pub competition_id: i64,
    pub user_id: i64,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = registrations)]
pub struct NewRegistrationRow {
    pub competition_id: i64,
    pub user_id: i64,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = StoreError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        Ok(Registration {
            id: row.id,
            competition_id: row.competition_id,
            user_id: row.user_id,
            status: row.status.parse()?,
            created_at: utc(row.created_at),
            deleted_at: row.deleted_at.map(utc),
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = idempotency_keys)]
pub struct IdempotencyRow {
    pub key: String,
    pub response: String,
    pub expires_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl From<IdempotencyRow> for IdempotencyRecord {
    fn from(row: IdempotencyRow) -> Self {
        IdempotencyRecord {
            key: row.key,
            response: row.response,
            expires_at: utc(row.expires_at),
            created_at: utc(row.created_at),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = notification_jobs)]
pub struct NotificationJobRow {
    pub id: i64,
    pub job_name: String,
    pub payload: String,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff_kind: String,
    pub backoff_delay_ms: i64,
    pub remove_on_success: bool,
    pub available_at: NaiveDateTime,
    pub locked_until: Option<NaiveDateTime>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub completed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notification_jobs)]
pub struct NewNotificationJobRow {
    pub job_name: String,
    pub payload: String,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff_kind: String,
    pub backoff_delay_ms: i64,
    pub remove_on_success: bool,
    pub available_at: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

impl TryFrom<NotificationJobRow> for NotificationJobRecord {
    type Error = StoreError;

    fn try_from(row: NotificationJobRow) -> Result<Self, Self::Error> {
        let delay = Duration::from_millis(row.backoff_delay_ms.max(0) as u64);
        let backoff = Backoff::from_parts(&row.backoff_kind, delay).ok_or_else(|| {
            StoreError::Invalid(format!("unknown backoff kind '{}'", row.backoff_kind))
        })?;
        Ok(NotificationJobRecord {
            id: row.id,
            job_name: row.job_name,
            payload: row.payload,
            attempts_made: row.attempts_made,
            max_attempts: row.max_attempts,
            backoff,
            remove_on_success: row.remove_on_success,
            available_at: utc(row.available_at),
            locked_until: row.locked_until.map(utc),
            locked_by: row.locked_by,
            last_error: row.last_error,
            completed_at: row.completed_at.map(utc),
            created_at: utc(row.created_at),
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = failed_jobs)]
pub struct FailedJobRow {
    pub id: i64,
    pub job_id: i64,
    pub job_name: String,
    pub payload: String,
    pub error: String,
    pub attempts: i32,
    pub failed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = failed_jobs)]
pub struct NewFailedJobRow {
    pub job_id: i64,
    pub job_name: String,
    pub payload: String,
    pub error: String,
    pub attempts: i32,
    pub failed_at: NaiveDateTime,
}

impl From<FailedJobRow> for FailedJob {
    fn from(row: FailedJobRow) -> Self {
        FailedJob {
            id: row.id,
            job_id: row.job_id,
            job_name: row.job_name,
            payload: row.payload,
            error: row.error,
            attempts: row.attempts,
            failed_at: utc(row.failed_at),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = mailbox)]
pub struct MailboxRow {
    pub id: i64,
    pub user_id: i64,
    pub recipient: String,
    pub kind: String,
    pub subject: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = mailbox)]
pub struct NewMailboxRow {
    pub user_id: i64,
    pub recipient: String,
    pub kind: String,
    pub subject: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

impl From<MailboxRow> for MailboxMessage {
    fn from(row: MailboxRow) -> Self {
        MailboxMessage {
            id: row.id,
            user_id: row.user_id,
            recipient: row.recipient,
            kind: row.kind,
            subject: row.subject,
            body: row.body,
            created_at: utc(row.created_at),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = competition_locks)]
pub struct LockRow {
    pub key: String,
    pub token: String,
    pub expires_at: NaiveDateTime,
}
