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

//! Message text for each notification type.
//!
//! Composition only reads the denormalized fields carried by the payload, so a
//! message can be built without touching the database.

use crate::models::{
    NewMailboxMessage, NotificationJob, RegistrationConfirmation, ReminderNotification,
};

const SIGNATURE: &str = "Best regards,\nSeatline Team";

/// Builds the mailbox message for a job.
pub fn compose(job: &NotificationJob) -> NewMailboxMessage {
    match job {
        NotificationJob::RegistrationConfirmation(p) => confirmation(job.name(), p),
        NotificationJob::ReminderNotification(p) => reminder(job.name(), p),
    }
}

fn confirmation(kind: &str, p: &RegistrationConfirmation) -> NewMailboxMessage {
    NewMailboxMessage {
        user_id: p.user_id,
        recipient: p.user_email.clone(),
        kind: kind.to_string(),
        subject: format!("Registration Confirmed: {}", p.competition_title),
        body: format!(
            "Hi {},\n\nYour registration for \"{}\" has been confirmed!\n\n\
             Registration ID: {}\nCompetition ID: {}\n\n\
             Thank you for registering.\n\n{}",
            p.user_name, p.competition_title, p.registration_id, p.competition_id, SIGNATURE
        ),
    }
}

fn reminder(kind: &str, p: &ReminderNotification) -> NewMailboxMessage {
    NewMailboxMessage {
        user_id: p.user_id,
        recipient: p.user_email.clone(),
        kind: kind.to_string(),
        subject: format!("Reminder: {} starts soon!", p.competition_title),
        body: format!(
            "Hi {},\n\nThis is a reminder that \"{}\" is starting on {}.\n\n\
             Competition ID: {}\n\nMake sure you're prepared!\n\n{}",
            p.user_name,
            p.competition_title,
            p.competition_start_date.format("%Y-%m-%d %H:%M UTC"),
            p.competition_id,
            SIGNATURE
        ),
    }
}
