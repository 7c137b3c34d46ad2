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

//! Notification job contract.
//!
//! Two job types exist, each with a fixed name and a camelCase JSON payload:
//!
//! | name                       | payload                        |
//! |----------------------------|--------------------------------|
//! | `registration-confirmation` | [`RegistrationConfirmation`]  |
//! | `reminder-notification`    | [`ReminderNotification`]       |
//!
//! Payloads are validated when enqueued and decoded again when dequeued, so a
//! row that was tampered with or written by an incompatible version is caught
//! before delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Backoff;
use crate::error::QueueError;

pub const REGISTRATION_CONFIRMATION: &str = "registration-confirmation";
pub const REMINDER_NOTIFICATION: &str = "reminder-notification";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegistrationConfirmation {
    pub registration_id: i64,
    pub user_id: i64,
    pub competition_id: i64,
    pub user_email: String,
    pub user_name: String,
    pub competition_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReminderNotification {
    pub user_id: i64,
    pub competition_id: i64,
    pub user_email: String,
    pub user_name: String,
    pub competition_title: String,
    pub competition_start_date: DateTime<Utc>,
}

/// A typed notification job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationJob {
    RegistrationConfirmation(RegistrationConfirmation),
    ReminderNotification(ReminderNotification),
}

impl NotificationJob {
    pub fn name(&self) -> &'static str {
        match self {
            NotificationJob::RegistrationConfirmation(_) => REGISTRATION_CONFIRMATION,
            NotificationJob::ReminderNotification(_) => REMINDER_NOTIFICATION,
        }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            NotificationJob::RegistrationConfirmation(p) => p.user_id,
            NotificationJob::ReminderNotification(p) => p.user_id,
        }
    }

    pub fn competition_id(&self) -> i64 {
        match self {
            NotificationJob::RegistrationConfirmation(p) => p.competition_id,
            NotificationJob::ReminderNotification(p) => p.competition_id,
        }
    }

    /// Checks the fields every delivery depends on.
    pub fn validate(&self) -> Result<(), QueueError> {
        let (email, name, title) = match self {
            NotificationJob::RegistrationConfirmation(p) => {
                if p.registration_id <= 0 {
                    return Err(self.invalid("registrationId must be positive"));
                }
                (&p.user_email, &p.user_name, &p.competition_title)
            }
            NotificationJob::ReminderNotification(p) => {
                (&p.user_email, &p.user_name, &p.competition_title)
            }
        };

        if self.user_id() <= 0 || self.competition_id() <= 0 {
            return Err(self.invalid("userId and competitionId must be positive"));
        }
        if !email.contains('@') {
            return Err(self.invalid("userEmail is not an email address"));
        }
        if name.trim().is_empty() || title.trim().is_empty() {
            return Err(self.invalid("userName and competitionTitle must not be empty"));
        }
        Ok(())
    }

    /// Validates and serializes the payload.
    pub fn encode(&self) -> Result<String, QueueError> {
        self.validate()?;
        let encoded = match self {
            NotificationJob::RegistrationConfirmation(p) => serde_json::to_string(p),
            NotificationJob::ReminderNotification(p) => serde_json::to_string(p),
        };
        encoded.map_err(|e| self.invalid(&e.to_string()))
    }

    /// Decodes and validates a stored payload.
    pub fn decode(job_name: &str, payload: &str) -> Result<Self, QueueError> {
        let invalid = |e: serde_json::Error| QueueError::InvalidPayload {
            job_name: job_name.to_string(),
            reason: e.to_string(),
        };
        let job = match job_name {
            REGISTRATION_CONFIRMATION => NotificationJob::RegistrationConfirmation(
                serde_json::from_str(payload).map_err(invalid)?,
            ),
            REMINDER_NOTIFICATION => NotificationJob::ReminderNotification(
                serde_json::from_str(payload).map_err(invalid)?,
            ),
            other => return Err(QueueError::UnknownJob(other.to_string())),
        };
        job.validate()?;
        Ok(job)
    }

    fn invalid(&self, reason: &str) -> QueueError {
        QueueError::InvalidPayload {
            job_name: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A job row as stored in the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationJobRecord {
    pub id: i64,
    pub job_name: String,
    pub payload: String,
    /// Attempts started so far, including a claim in progress.
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub backoff: Backoff,
    pub remove_on_success: bool,
    pub available_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationJobRecord {
    /// True when the current attempt is the last one allowed.
    pub fn is_final_attempt(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}
