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

use chrono::{Duration, Utc};
use diesel::RunQueryDsl;
use seatline::dal::registration::RegistrationAttempt;
use seatline::lock::InMemoryLockStore;
use seatline::models::{NotificationJob, REMINDER_NOTIFICATION};
use seatline::registration::RegistrationRequest;
use seatline::scheduler::{ReminderScheduler, Scheduler};
use seatline::SchedulerConfig;
use std::sync::Arc;

use crate::fixtures::TestFixture;

#[tokio::test]
async fn test_reminders_for_competitions_starting_soon() {
    let fixture = TestFixture::new().await;
    let now = Utc::now();
    let deadline = now + Duration::hours(2);

    let soon = fixture
        .competition_with(5, deadline, Some(now + Duration::hours(6)))
        .await;
    let later = fixture
        .competition_with(5, deadline, Some(now + Duration::days(3)))
        .await;
    let unscheduled = fixture.competition_with(5, deadline, None).await;

    let users = fixture.participants(3).await;
    let orchestrator = fixture.orchestrator();
    for user in &users {
        for competition in [&soon, &later, &unscheduled] {
            orchestrator
                .register(RegistrationRequest::new(competition.id, user.id))
                .await
                .unwrap();
        }
    }
    // Withdrawn participants are not reminded.
    orchestrator.withdraw(soon.id, users[2].id).await.unwrap();

    let queue = fixture.queue();
    let confirmations = queue.pending().await.unwrap().len();

    let scheduler = ReminderScheduler::new(fixture.dal.clone(), queue.clone(), SchedulerConfig::default());
    let enqueued = scheduler.run_once(now).await.unwrap();
    assert_eq!(enqueued, 2);

    let reminders: Vec<_> = queue
        .pending()
        .await
        .unwrap()
        .into_iter()
        .filter(|job| job.job_name == REMINDER_NOTIFICATION)
        .collect();
    assert_eq!(reminders.len(), 2);
    assert_eq!(queue.pending().await.unwrap().len(), confirmations + 2);

    for record in reminders {
        let NotificationJob::ReminderNotification(payload) =
            NotificationJob::decode(&record.job_name, &record.payload).unwrap()
        else {
            panic!("expected a reminder payload");
        };
        assert_eq!(payload.competition_id, soon.id);
        assert_ne!(payload.user_id, users[2].id);
        assert_eq!(Some(payload.competition_start_date), soon.start_at);
    }
}

#[tokio::test]
async fn test_scan_with_nothing_upcoming() {
    let fixture = TestFixture::new().await;
    let scheduler = ReminderScheduler::new(
        fixture.dal.clone(),
        fixture.queue(),
        SchedulerConfig::default(),
    );
    assert_eq!(scheduler.run_once(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_scheduler_starts_and_stops() {
    let fixture = TestFixture::new().await;
    let scheduler = Scheduler::start(
        fixture.dal.clone(),
        fixture.queue(),
        Arc::new(InMemoryLockStore::new()),
        SchedulerConfig::default(),
    )
    .unwrap();
    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_unenqueueable_reminder_does_not_stop_the_scan() {
    let fixture = TestFixture::new().await;
    let now = Utc::now();
    let competition = fixture
        .competition_with(5, now + Duration::hours(1), Some(now + Duration::hours(2)))
        .await;

    // A row written before names were validated.
    diesel::sql_query(
        "INSERT INTO users (email, name, role) VALUES ('blank@example.com', '', 'participant')",
    )
    .execute(&mut fixture.raw_connection())
    .unwrap();
    let blank = fixture
        .dal
        .user()
        .get_by_email("blank@example.com")
        .await
        .unwrap()
        .unwrap();
    let ada = fixture.participant("Ada").await;

    for user_id in [blank.id, ada.id] {
        fixture
            .dal
            .registration()
            .register_participant(RegistrationAttempt::new(competition.id, user_id))
            .await
            .unwrap();
    }

    let queue = fixture.queue();
    let scheduler = ReminderScheduler::new(fixture.dal.clone(), queue.clone(), SchedulerConfig::default());
    assert_eq!(scheduler.run_once(now).await.unwrap(), 1);

    let pending = queue.pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    let NotificationJob::ReminderNotification(payload) =
        NotificationJob::decode(&pending[0].job_name, &pending[0].payload).unwrap()
    else {
        panic!("expected a reminder payload");
    };
    assert_eq!(payload.user_id, ada.id);
}
