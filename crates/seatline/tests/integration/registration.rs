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

use seatline::idempotency::{IdempotencyKey, IdempotencyStore};
use seatline::lock::{competition_lock_key, DistributedLock, InMemoryLockStore};
use seatline::models::REGISTRATION_CONFIRMATION;
use seatline::registration::RegistrationRequest;
use seatline::{ErrorKind, RegistrationConfig, RegistrationError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::fixtures::TestFixture;

#[tokio::test]
async fn test_successful_registration_enqueues_confirmation() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(5).await;
    let user = fixture.participant("Ada").await;
    let lock = Arc::new(InMemoryLockStore::new());
    let orchestrator = fixture.orchestrator_with(lock.clone(), RegistrationConfig::default());

    let receipt = orchestrator
        .register(RegistrationRequest::new(competition.id, user.id))
        .await
        .unwrap();

    assert!(!receipt.replayed);
    assert_eq!(receipt.response.competition_id, competition.id);
    assert_eq!(receipt.response.user_id, user.id);
    assert_eq!(receipt.response.competition_title, "Open Chess");

    let pending = fixture.queue().pending().await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].job_name, REGISTRATION_CONFIRMATION);
    assert_eq!(pending[0].max_attempts, 3);

    // The lock never outlives the request.
    assert!(lock.holder(&competition_lock_key(competition.id)).is_none());
}

#[tokio::test]
async fn test_lock_held_elsewhere_is_busy() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(5).await;
    let user = fixture.participant("Ada").await;
    let lock = Arc::new(InMemoryLockStore::new());
    let orchestrator = fixture.orchestrator_with(lock.clone(), RegistrationConfig::default());

    let key = competition_lock_key(competition.id);
    assert!(lock
        .try_acquire(&key, "someone-else", Duration::from_secs(30))
        .await
        .unwrap());

    let err = orchestrator
        .register(RegistrationRequest::new(competition.id, user.id))
        .await
        .unwrap_err();

    assert!(matches!(err, RegistrationError::Busy { .. }));
    assert!(err.is_retryable());
    // The other holder's lock is untouched.
    assert_eq!(lock.holder(&key).as_deref(), Some("someone-else"));
    assert_eq!(
        fixture.dal.registration().count_active(competition.id).await.unwrap(),
        0
    );
}

#[tokio::test]
async fn test_failures_release_the_lock() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(1).await;
    let users = fixture.participants(2).await;
    let lock = Arc::new(InMemoryLockStore::new());
    let orchestrator = fixture.orchestrator_with(lock.clone(), RegistrationConfig::default());

    orchestrator
        .register(RegistrationRequest::new(competition.id, users[0].id))
        .await
        .unwrap();
    let err = orchestrator
        .register(RegistrationRequest::new(competition.id, users[1].id))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
    assert!(lock.holder(&competition_lock_key(competition.id)).is_none());
    assert_eq!(fixture.queue().pending().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_capacity_one_two_concurrent_requests() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(1).await;
    let users = fixture.participants(2).await;
    let orchestrator = fixture.orchestrator();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for user in &users {
        let orchestrator = orchestrator.clone();
        let barrier = barrier.clone();
        let request = RegistrationRequest::new(competition.id, user.id);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            orchestrator.register(request).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(
                matches!(e.kind(), ErrorKind::CapacityExceeded | ErrorKind::Busy),
                "unexpected error: {e}"
            ),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(
        fixture.dal.registration().count_active(competition.id).await.unwrap(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clients_retrying_on_busy_fill_exactly_capacity() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(3).await;
    let users = fixture.participants(8).await;
    let orchestrator = fixture.orchestrator();

    let barrier = Arc::new(Barrier::new(users.len()));
    let mut handles = Vec::new();
    for user in &users {
        let orchestrator = orchestrator.clone();
        let barrier = barrier.clone();
        let request = RegistrationRequest::new(competition.id, user.id);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            loop {
                match orchestrator.register(request.clone()).await {
                    Err(e) if e.kind() == ErrorKind::Busy => {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    other => return other,
                }
            }
        }));
    }

    let mut succeeded = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) if e.kind() == ErrorKind::CapacityExceeded => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 3);
    assert_eq!(full, 5);
    assert_eq!(fixture.queue().pending().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_withdraw() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(2).await;
    let user = fixture.participant("Ada").await;
    let orchestrator = fixture.orchestrator();

    assert!(orchestrator
        .withdraw(competition.id, user.id)
        .await
        .unwrap()
        .is_none());

    orchestrator
        .register(RegistrationRequest::new(competition.id, user.id))
        .await
        .unwrap();
    let withdrawn = orchestrator
        .withdraw(competition.id, user.id)
        .await
        .unwrap()
        .unwrap();
    assert!(withdrawn.deleted_at.is_some());

    // A fresh registration after withdrawal is allowed.
    orchestrator
        .register(RegistrationRequest::new(competition.id, user.id))
        .await
        .unwrap();
    assert_eq!(
        fixture.dal.registration().count_active(competition.id).await.unwrap(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transaction_timeout_commits_nothing() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(5).await;
    let user = fixture.participant("Ada").await;
    let lock = Arc::new(InMemoryLockStore::new());
    let config = RegistrationConfig::builder()
        .lock_ttl(Duration::from_secs(5))
        .transaction_timeout(Duration::from_millis(300))
        .build()
        .unwrap();
    let orchestrator = fixture.orchestrator_with(lock.clone(), config);
    let key = IdempotencyKey::parse("slow-disk").unwrap();
    let request =
        RegistrationRequest::new(competition.id, user.id).with_idempotency_key(key.clone());

    // Another writer keeps the database busy well past the deadline.
    let holder = fixture.hold_write_lock(Duration::from_millis(1200)).await;
    let err = orchestrator.register(request.clone()).await.unwrap_err();
    holder.await.unwrap();

    assert!(
        matches!(err, RegistrationError::TransactionTimeout { timeout } if timeout == Duration::from_millis(300)),
        "unexpected error: {err}"
    );
    assert!(err.is_retryable());
    assert!(lock.holder(&competition_lock_key(competition.id)).is_none());
    assert_eq!(
        fixture.dal.registration().count_active(competition.id).await.unwrap(),
        0
    );
    assert!(fixture.queue().pending().await.unwrap().is_empty());
    assert!(IdempotencyStore::new(fixture.dal.clone())
        .lookup(&key)
        .await
        .unwrap()
        .is_none());

    // Resubmitting once the database is free registers normally.
    let receipt = orchestrator.register(request).await.unwrap();
    assert!(!receipt.replayed);
    assert_eq!(fixture.queue().pending().await.unwrap().len(), 1);
}
