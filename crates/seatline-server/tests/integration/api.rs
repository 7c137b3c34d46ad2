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


use axum::body::Body;
use axum::http::{Method, StatusCode};
use seatline::models::Role;
use seatline::worker::{MailboxChannel, NotificationWorker};
use seatline::WorkerConfig;
use serde_json::json;
use std::sync::Arc;

use crate::fixtures::{request, ApiFixture};

#[tokio::test]
async fn test_health_needs_no_identity() {
    let fixture = ApiFixture::new().await;
    let response = fixture.get("/health", None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["status"], "ok");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let fixture = ApiFixture::new().await;
    let response = fixture.get("/users/me/registrations", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.json()["error"], "unauthorized");
}

#[tokio::test]
async fn test_unknown_user_is_unauthorized() {
    let fixture = ApiFixture::new().await;
    let response = fixture
        .send(
            axum::http::Request::builder()
                .method(Method::GET)
                .uri("/users/me/mailbox")
                .header("x-user-id", "9999")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_participant_cannot_create_competition() {
    let fixture = ApiFixture::new().await;
    let participant = fixture.user("Ada", Role::Participant).await;

    let response = fixture
        .post_json(
            "/competitions",
            Some(&participant),
            json!({
                "title": "Open Chess",
                "description": "Rapid",
                "capacity": 10,
                "registrationDeadline": "2099-01-01T00:00:00Z"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json()["error"], "forbidden");
}

#[tokio::test]
async fn test_organizer_creates_and_anyone_reads_competition() {
    let fixture = ApiFixture::new().await;
    let organizer = fixture.user("Grace", Role::Organizer).await;

    let created = fixture
        .post_json(
            "/competitions",
            Some(&organizer),
            json!({
                "title": "  Spring Hackathon ",
                "description": "48 hours",
                "tags": ["rust", "ai", "rust"],
                "capacity": 2,
                "registrationDeadline": "2099-01-01T00:00:00Z"
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let created = created.json();
    assert_eq!(created["title"], "Spring Hackathon");
    assert_eq!(created["tags"], json!(["ai", "rust"]));
    assert_eq!(created["organizerId"], organizer.id);

    let id = created["id"].as_i64().unwrap();
    let detail = fixture.get(&format!("/competitions/{id}"), None).await;
    assert_eq!(detail.status, StatusCode::OK);
    let detail = detail.json();
    assert_eq!(detail["registeredCount"], 0);
    assert_eq!(detail["seatsLeft"], 2);
}

#[tokio::test]
async fn test_invalid_competition_is_bad_request() {
    let fixture = ApiFixture::new().await;
    let organizer = fixture.user("Grace", Role::Organizer).await;

    let response = fixture
        .post_json(
            "/competitions",
            Some(&organizer),
            json!({
                "title": "Open Chess",
                "description": "Rapid",
                "capacity": 0,
                "registrationDeadline": "2099-01-01T00:00:00Z"
            }),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_competition_is_not_found() {
    let fixture = ApiFixture::new().await;
    let response = fixture.get("/competitions/424242", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failed_jobs_are_admin_only() {
    let fixture = ApiFixture::new().await;
    let admin = fixture.user("Root", Role::Admin).await;
    let participant = fixture.user("Ada", Role::Participant).await;

    let denied = fixture.get("/admin/failed-jobs", Some(&participant)).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let page = fixture
        .get("/admin/failed-jobs?page=1&perPage=10", Some(&admin))
        .await;
    assert_eq!(page.status, StatusCode::OK);
    let page = page.json();
    assert_eq!(page["total"], 0);
    assert_eq!(page["perPage"], 10);
    assert_eq!(page["items"], json!([]));
}

#[tokio::test]
async fn test_mailbox_shows_delivered_confirmation() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(3).await;
    let participant = fixture.user("Ada", Role::Participant).await;

    let registered = fixture.register(competition.id, &participant, None).await;
    assert_eq!(registered.status, StatusCode::CREATED);

    let worker = NotificationWorker::new(
        fixture.dal.clone(),
        fixture.queue(),
        Arc::new(MailboxChannel::new(fixture.dal.clone())),
        WorkerConfig::default(),
    );
    assert_eq!(worker.run_once().await.unwrap(), 1);

    let mailbox = fixture.get("/users/me/mailbox", Some(&participant)).await;
    assert_eq!(mailbox.status, StatusCode::OK);
    let messages = mailbox.json();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["recipient"], "ada@example.com");
    assert_eq!(messages[0]["subject"], "Registration Confirmed: Open Chess");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let fixture = ApiFixture::new().await;
    let organizer = fixture.user("Grace", Role::Organizer).await;

    let mut oversized = request(
        Method::POST,
        "/competitions",
        Some(&organizer),
        Body::from(vec![b'x'; 128 * 1024]),
    );
    let headers = oversized.headers_mut();
    headers.insert("content-type", "application/json".parse().unwrap());
    headers.insert("content-length", (128 * 1024).to_string().parse().unwrap());
    let response = fixture.send(oversized).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
}
