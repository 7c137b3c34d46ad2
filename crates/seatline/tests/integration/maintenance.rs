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
use seatline::idempotency::{IdempotencyKey, IdempotencyStore};
use seatline::lock::{DatabaseLockStore, DistributedLock};
use seatline::maintenance::MaintenanceSweeper;
use seatline::registration::RegistrationRequest;
use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::TestFixture;

fn sweeper(fixture: &TestFixture) -> MaintenanceSweeper {
    MaintenanceSweeper::new(
        fixture.dal.clone(),
        Arc::new(DatabaseLockStore::new(fixture.dal.clone())),
    )
}

#[tokio::test]
async fn test_idempotency_sweep_uses_cutoff() {
    let fixture = TestFixture::new().await;
    let store = IdempotencyStore::new(fixture.dal.clone());
    let short = IdempotencyKey::parse("short").unwrap();
    let long = IdempotencyKey::parse("long").unwrap();
    store.store(&short, "{}", Duration::from_secs(60)).await.unwrap();
    store.store(&long, "{}", Duration::from_secs(3_600)).await.unwrap();

    let later = Utc::now() + ChronoDuration::minutes(5);
    assert_eq!(fixture.dal.idempotency().count_expired(later).await.unwrap(), 1);

    let sweeper = sweeper(&fixture);
    assert_eq!(sweeper.purge_idempotency(Utc::now()).await.unwrap(), 0);
    assert_eq!(
        sweeper
            .purge_idempotency(Utc::now() + ChronoDuration::minutes(5))
            .await
            .unwrap(),
        1
    );
    assert!(store.lookup(&short).await.unwrap().is_none());
    assert!(store.lookup(&long).await.unwrap().is_some());
}

#[tokio::test]
async fn test_registration_purge_only_removes_withdrawn_rows() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(5).await;
    let users = fixture.participants(2).await;
    let orchestrator = fixture.orchestrator();
    for user in &users {
        orchestrator
            .register(RegistrationRequest::new(competition.id, user.id))
            .await
            .unwrap();
    }
    let withdrawn = orchestrator
        .withdraw(competition.id, users[0].id)
        .await
        .unwrap()
        .unwrap();

    let cutoff = Utc::now() + ChronoDuration::seconds(1);
    assert_eq!(
        fixture.dal.registration().count_deleted_before(cutoff).await.unwrap(),
        1
    );

    let sweeper = sweeper(&fixture);
    let retention = Duration::from_secs(30 * 24 * 60 * 60);
    assert_eq!(
        sweeper
            .purge_registrations_older_than(Utc::now(), retention)
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        sweeper
            .purge_registrations(cutoff)
            .await
            .unwrap(),
        1
    );

    assert!(fixture.dal.registration().get(withdrawn.id).await.unwrap().is_none());
    assert_eq!(
        fixture.dal.registration().count_active(competition.id).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn test_lock_sweep() {
    let fixture = TestFixture::new().await;
    let past = Utc::now() - ChronoDuration::minutes(1);
    fixture
        .dal
        .lock()
        .try_acquire("lock:competition:1", "stale", Duration::from_secs(5), past)
        .await
        .unwrap();
    let live = DatabaseLockStore::new(fixture.dal.clone());
    live.try_acquire("lock:competition:2", "live", Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(sweeper(&fixture).purge_locks().await.unwrap(), 1);
    assert!(fixture.dal.lock().get("lock:competition:2").await.unwrap().is_some());
}
