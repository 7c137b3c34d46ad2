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

use chrono::Utc;
use seatline::lock::{competition_lock_key, DatabaseLockStore, DistributedLock};
use seatline::registration::{RegistrationOrchestrator, RegistrationRequest};
use seatline::RegistrationConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::fixtures::TestFixture;

const TTL: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_database_lock_acquire_and_release() {
    let fixture = TestFixture::new().await;
    let locks = DatabaseLockStore::new(fixture.dal.clone());
    let key = competition_lock_key(1);

    assert!(locks.try_acquire(&key, "a", TTL).await.unwrap());
    assert!(!locks.try_acquire(&key, "b", TTL).await.unwrap());
    assert!(!locks.release(&key, "b").await.unwrap());
    assert!(locks.release(&key, "a").await.unwrap());
    assert!(locks.try_acquire(&key, "b", TTL).await.unwrap());
}

#[tokio::test]
async fn test_expired_and_reacquired_lock_ignores_old_release() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal.clone();
    let key = competition_lock_key(7);
    let now = Utc::now();

    assert!(dal.lock().try_acquire(&key, "old", TTL, now).await.unwrap());

    let later = now + chrono::Duration::seconds(6);
    assert!(dal.lock().try_acquire(&key, "new", TTL, later).await.unwrap());

    assert!(!dal.lock().release(&key, "old").await.unwrap());
    let row = dal.lock().get(&key).await.unwrap().unwrap();
    assert_eq!(row.token, "new");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_database_lock_admits_one_of_many() {
    let fixture = TestFixture::new().await;
    let locks = DatabaseLockStore::new(fixture.dal.clone());
    let key = competition_lock_key(3);

    let barrier = Arc::new(Barrier::new(6));
    let mut handles = Vec::new();
    for n in 0..6 {
        let locks = locks.clone();
        let barrier = barrier.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            locks.try_acquire(&key, &format!("holder-{n}"), TTL).await.unwrap()
        }));
    }

    let mut acquired = 0;
    for handle in handles {
        if handle.await.unwrap() {
            acquired += 1;
        }
    }
    assert_eq!(acquired, 1);
}

#[tokio::test]
async fn test_orchestrator_over_database_lock() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(2).await;
    let user = fixture.participant("Ada").await;
    let locks = Arc::new(DatabaseLockStore::new(fixture.dal.clone()));
    let orchestrator = RegistrationOrchestrator::new(
        fixture.dal.clone(),
        locks,
        fixture.queue(),
        RegistrationConfig::default(),
    );

    orchestrator
        .register(RegistrationRequest::new(competition.id, user.id))
        .await
        .unwrap();

    let key = competition_lock_key(competition.id);
    assert!(fixture.dal.lock().get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_expired_rows() {
    let fixture = TestFixture::new().await;
    let dal = fixture.dal.clone();
    let past = Utc::now() - chrono::Duration::minutes(5);

    assert!(dal.lock().try_acquire("lock:competition:1", "a", TTL, past).await.unwrap());
    assert!(dal.lock().try_acquire("lock:competition:2", "b", TTL, Utc::now()).await.unwrap());

    let locks = DatabaseLockStore::new(dal.clone());
    assert_eq!(locks.purge_expired().await.unwrap(), 1);
    assert!(dal.lock().get("lock:competition:2").await.unwrap().is_some());
}
