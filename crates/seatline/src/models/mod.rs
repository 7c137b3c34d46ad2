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

//! Domain types.
//!
//! These are backend-independent. The DAL converts between them and the
//! Diesel row structs in `dal::models`.

pub mod competition;
pub mod failed_job;
pub mod idempotency;
pub mod mailbox;
pub mod notification;
pub mod registration;
pub mod user;

pub use competition::{Competition, CompetitionDetail, NewCompetition};
pub use failed_job::{FailedJob, NewFailedJob};
pub use idempotency::IdempotencyRecord;
pub use mailbox::{MailboxMessage, NewMailboxMessage};
pub use notification::{
    NotificationJob, NotificationJobRecord, RegistrationConfirmation, ReminderNotification,
    REGISTRATION_CONFIRMATION, REMINDER_NOTIFICATION,
};
pub use registration::{
    RegisteredParticipant, Registration, RegistrationResponse, RegistrationStatus,
};
pub use user::{NewUser, Role, User};
