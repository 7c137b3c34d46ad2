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
use seatline::error::IdempotencyError;
use seatline::idempotency::{IdempotencyKey, IdempotencyStore};
use seatline::registration::RegistrationRequest;
use seatline::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

use crate::fixtures::TestFixture;

#[tokio::test]
async fn test_repeated_key_replays_identical_bytes() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(5).await;
    let user = fixture.participant("Ada").await;
    let orchestrator = fixture.orchestrator();
    let key = IdempotencyKey::parse("c0ffee-0001").unwrap();

    let request = RegistrationRequest::new(competition.id, user.id).with_idempotency_key(key);
    let first = orchestrator.register(request.clone()).await.unwrap();
    let second = orchestrator.register(request).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.body.as_bytes(), second.body.as_bytes());
    assert_eq!(first.response, second.response);

    assert_eq!(
        fixture.dal.registration().count_active(competition.id).await.unwrap(),
        1
    );
    assert_eq!(fixture.queue().pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_replay_ignores_request_fields() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(5).await;
    let other = fixture.competition(5).await;
    let user = fixture.participant("Ada").await;
    let orchestrator = fixture.orchestrator();
    let key = IdempotencyKey::parse("retry-me").unwrap();

    let first = orchestrator
        .register(RegistrationRequest::new(competition.id, user.id).with_idempotency_key(key.clone()))
        .await
        .unwrap();
    let replay = orchestrator
        .register(RegistrationRequest::new(other.id, user.id).with_idempotency_key(key))
        .await
        .unwrap();

    assert!(replay.replayed);
    assert_eq!(replay.body, first.body);
    assert_eq!(
        fixture.dal.registration().count_active(other.id).await.unwrap(),
        0
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_registers_once() {
    let fixture = TestFixture::new().await;
    let competition = fixture.competition(5).await;
    let user = fixture.participant("Ada").await;
    let orchestrator = fixture.orchestrator();
    let key = IdempotencyKey::parse("double-click").unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let orchestrator = orchestrator.clone();
        let barrier = barrier.clone();
        let request =
            RegistrationRequest::new(competition.id, user.id).with_idempotency_key(key.clone());
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            orchestrator.register(request).await
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => bodies.push(receipt.body),
            // Only a request that lost the race for the lock may fail.
            Err(e) => assert_eq!(e.kind(), ErrorKind::Busy, "unexpected error: {e}"),
        }
    }

    assert!(!bodies.is_empty());
    assert!(bodies.iter().all(|b| b == &bodies[0]));
    assert_eq!(
        fixture.dal.registration().count_active(competition.id).await.unwrap(),
        1
    );
    assert_eq!(fixture.queue().pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_is_write_once() {
    let fixture = TestFixture::new().await;
    let store = IdempotencyStore::new(fixture.dal.clone());
    let key = IdempotencyKey::parse("abc").unwrap();

    store.store(&key, r#"{"first":true}"#, Duration::from_secs(60)).await.unwrap();
    let err = store
        .store(&key, r#"{"first":false}"#, Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, IdempotencyError::Conflict { .. }));

    let stored = store.lookup(&key).await.unwrap().unwrap();
    assert_eq!(stored.body, r#"{"first":true}"#);

    // Keys are opaque.
    let other = IdempotencyKey::parse("ABC").unwrap();
    assert!(store.lookup(&other).await.unwrap().is_none());
}

#[tokio::test]
async fn test_expired_records_stay_readable_until_purged() {
    let fixture = TestFixture::new().await;
    let store = IdempotencyStore::new(fixture.dal.clone());
    let key = IdempotencyKey::parse("short-lived").unwrap();

    store.store(&key, "{}", Duration::ZERO).await.unwrap();
    let stored = store.lookup(&key).await.unwrap().unwrap();
    assert!(stored.is_expired_at(Utc::now()));

    let purged = store
        .purge_expired(Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert!(store.lookup(&key).await.unwrap().is_none());
}
