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

use chrono::{Duration as ChronoDuration, Utc};
use diesel::RunQueryDsl;
use seatline::config::{Backoff, JobOptions};
use seatline::error::QueueError;
use seatline::models::{NotificationJob, ReminderNotification};
use seatline::queue::FailureDisposition;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::fixtures::{immediate_retries, TestFixture};

fn reminder(user_id: i64) -> NotificationJob {
    NotificationJob::ReminderNotification(ReminderNotification {
        user_id,
        competition_id: 1,
        user_email: "ada@example.com".to_string(),
        user_name: "Ada".to_string(),
        competition_title: "Open Chess".to_string(),
        competition_start_date: Utc::now() + ChronoDuration::hours(3),
    })
}

#[tokio::test]
async fn test_enqueue_rejects_invalid_payload() {
    let fixture = TestFixture::new().await;
    let mut job = reminder(1);
    if let NotificationJob::ReminderNotification(p) = &mut job {
        p.user_email = "not-an-email".to_string();
    }

    let err = fixture.queue().enqueue(&job, JobOptions::default()).await.unwrap_err();
    assert!(matches!(err, QueueError::InvalidPayload { .. }));
    assert!(fixture.queue().pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_waits_for_backoff() {
    let fixture = TestFixture::new().await;
    let queue = fixture.queue();
    let options = JobOptions {
        attempts: 3,
        backoff: Backoff::Exponential {
            delay: Duration::from_secs(60),
        },
        remove_on_success: true,
    };
    queue.enqueue(&reminder(1), options).await.unwrap();

    let claimed = queue.claim("w1", 10, Duration::from_secs(30)).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].attempts_made, 1);

    let before = Utc::now();
    let disposition = queue.fail(&claimed[0], "boom").await.unwrap();
    let FailureDisposition::Retried { retry_at } = disposition else {
        panic!("expected a retry, got {disposition:?}");
    };
    assert!(retry_at >= before + ChronoDuration::seconds(60));

    // Not claimable until the backoff elapses.
    assert!(queue.claim("w2", 10, Duration::from_secs(30)).await.unwrap().is_empty());

    let stored = fixture
        .dal
        .notification_job()
        .get(claimed[0].id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.last_error.as_deref(), Some("boom"));
    assert!(stored.locked_by.is_none());
}

#[tokio::test]
async fn test_claimed_job_is_invisible_until_timeout() {
    let fixture = TestFixture::new().await;
    let queue = fixture.queue();
    queue.enqueue(&reminder(1), JobOptions::default()).await.unwrap();

    let first = queue.claim("w1", 10, Duration::from_millis(50)).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(queue.claim("w2", 10, Duration::from_secs(30)).await.unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(80)).await;
    let second = queue.claim("w2", 10, Duration::from_secs(30)).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].attempts_made, 2);
    assert_eq!(second[0].locked_by.as_deref(), Some("w2"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_never_share_a_job() {
    let fixture = TestFixture::new().await;
    let queue = fixture.queue();
    for n in 1..=12 {
        queue.enqueue(&reminder(n), JobOptions::default()).await.unwrap();
    }

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for n in 0..4 {
        let queue = queue.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            queue
                .claim(&format!("w{n}"), 5, Duration::from_secs(30))
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.extend(handle.await.unwrap().into_iter().map(|job| job.id));
    }
    let total = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), total);
    assert_eq!(total, 12);
}

#[tokio::test]
async fn test_completion_can_keep_the_row() {
    let fixture = TestFixture::new().await;
    let queue = fixture.queue();
    let options = JobOptions {
        remove_on_success: false,
        ..JobOptions::default()
    };
    let id = queue.enqueue(&reminder(1), options).await.unwrap();

    let claimed = queue.claim("w1", 1, Duration::from_secs(30)).await.unwrap();
    queue.complete(&claimed[0]).await.unwrap();

    let stored = fixture.dal.notification_job().get(id).await.unwrap().unwrap();
    assert!(stored.completed_at.is_some());
    assert!(queue.pending().await.unwrap().is_empty());
    assert!(queue.claim("w1", 1, Duration::from_secs(30)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lost_dead_letter_still_drops_the_job() {
    let fixture = TestFixture::new().await;
    let queue = fixture.queue();
    let id = queue.enqueue(&reminder(1), immediate_retries(1)).await.unwrap();

    // Every dead-letter insert fails from here on.
    diesel::sql_query("DROP TABLE failed_jobs")
        .execute(&mut fixture.raw_connection())
        .unwrap();

    let claimed = queue.claim("w1", 1, Duration::from_secs(30)).await.unwrap();
    let disposition = queue.fail(&claimed[0], "smtp unreachable").await.unwrap();

    assert_eq!(disposition, FailureDisposition::DeadLetterLost);
    assert!(fixture.dal.notification_job().get(id).await.unwrap().is_none());
    assert!(queue.pending().await.unwrap().is_empty());
    assert!(queue.claim("w2", 1, Duration::ZERO).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lapsed_claim_cannot_settle_a_reclaimed_job() {
    let fixture = TestFixture::new().await;
    let queue = fixture.queue();
    let id = queue.enqueue(&reminder(1), JobOptions::default()).await.unwrap();

    let stale = queue.claim("w1", 1, Duration::from_millis(50)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    let live = queue.claim("w2", 1, Duration::from_secs(30)).await.unwrap();
    assert_eq!(live[0].id, id);

    assert!(!queue.complete(&stale[0]).await.unwrap());
    assert_eq!(
        queue.fail(&stale[0], "timed out").await.unwrap(),
        FailureDisposition::ClaimLost
    );

    // The second worker still owns the job, so nobody else can claim it.
    let stored = fixture.dal.notification_job().get(id).await.unwrap().unwrap();
    assert_eq!(stored.locked_by.as_deref(), Some("w2"));
    assert!(queue.claim("w3", 1, Duration::from_secs(30)).await.unwrap().is_empty());

    assert!(queue.complete(&live[0]).await.unwrap());
    assert!(fixture.dal.notification_job().get(id).await.unwrap().is_none());
}
