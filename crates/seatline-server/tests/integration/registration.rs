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


use axum::http::StatusCode;
use seatline::models::Role;
use serde_json::json;

use crate::fixtures::ApiFixture;

#[tokio::test]
async fn test_register_returns_created_with_stored_body() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(3).await;
    let ada = fixture.user("Ada", Role::Participant).await;

    let response = fixture.register(competition.id, &ada, None).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(response.headers.get("idempotent-replayed").is_none());

    let body = response.json();
    assert_eq!(body["competitionId"], competition.id);
    assert_eq!(body["userId"], ada.id);
    assert_eq!(body["competitionTitle"], "Open Chess");

    let detail = fixture
        .get(&format!("/competitions/{}", competition.id), None)
        .await
        .json();
    assert_eq!(detail["registeredCount"], 1);
    assert_eq!(detail["seatsLeft"], 2);
}

#[tokio::test]
async fn test_replay_returns_identical_bytes() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(3).await;
    let ada = fixture.user("Ada", Role::Participant).await;

    let first = fixture
        .register(competition.id, &ada, Some("9b1f4c2e-signup"))
        .await;
    let second = fixture
        .register(competition.id, &ada, Some("9b1f4c2e-signup"))
        .await;

    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(second.status, StatusCode::CREATED);
    assert_eq!(first.body, second.body);
    assert_eq!(second.headers.get("idempotent-replayed").unwrap(), "true");

    let registrations = fixture
        .get("/users/me/registrations", Some(&ada))
        .await
        .json();
    assert_eq!(registrations.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_second_registration_conflicts() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(3).await;
    let ada = fixture.user("Ada", Role::Participant).await;

    fixture.register(competition.id, &ada, None).await;
    let response = fixture.register(competition.id, &ada, None).await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(
        response.json(),
        json!({
            "error": "already_registered",
            "message": format!(
                "User {} is already registered for competition {}",
                ada.id, competition.id
            ),
            "retryable": false
        })
    );
}

#[tokio::test]
async fn test_full_competition_is_bad_request() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(1).await;
    let ada = fixture.user("Ada", Role::Participant).await;
    let alan = fixture.user("Alan", Role::Participant).await;

    assert_eq!(
        fixture.register(competition.id, &ada, None).await.status,
        StatusCode::CREATED
    );
    let response = fixture.register(competition.id, &alan, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "capacity_exceeded");
}

#[tokio::test]
async fn test_register_for_unknown_competition_is_not_found() {
    let fixture = ApiFixture::new().await;
    let ada = fixture.user("Ada", Role::Participant).await;

    let response = fixture.register(424242, &ada, None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json()["error"], "not_found");
}

#[tokio::test]
async fn test_organizer_cannot_register() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(3).await;
    let grace = fixture.user("Grace", Role::Organizer).await;

    let response = fixture.register(competition.id, &grace, None).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_empty_idempotency_key_is_bad_request() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(3).await;
    let ada = fixture.user("Ada", Role::Participant).await;

    let response = fixture.register(competition.id, &ada, Some("")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_withdraw_frees_the_seat() {
    let fixture = ApiFixture::new().await;
    let competition = fixture.competition(1).await;
    let ada = fixture.user("Ada", Role::Participant).await;
    let alan = fixture.user("Alan", Role::Participant).await;

    fixture.register(competition.id, &ada, None).await;
    let withdrawn = fixture.withdraw(competition.id, &ada).await;
    assert_eq!(withdrawn.status, StatusCode::OK);
    assert!(withdrawn.json()["deletedAt"].is_string());

    let again = fixture.withdraw(competition.id, &ada).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let response = fixture.register(competition.id, &alan, None).await;
    assert_eq!(response.status, StatusCode::CREATED);
}
