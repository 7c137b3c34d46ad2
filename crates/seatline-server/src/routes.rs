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


//! Route handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use seatline::idempotency::IdempotencyKey;
use seatline::models::{
    Competition, CompetitionDetail, FailedJob, MailboxMessage, NewCompetition, Registration,
};
use seatline::registration::RegistrationRequest;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::AppState;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const REPLAYED_HEADER: &str = "idempotent-replayed";

const DEFAULT_MAILBOX_LIMIT: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn create_competition(
    State(state): State<AppState>,
    Extension(CurrentUser(organizer)): Extension<CurrentUser>,
    Json(mut new_competition): Json<NewCompetition>,
) -> Result<(StatusCode, Json<Competition>), ApiError> {
    new_competition.organizer_id = organizer.id;
    let competition = state.dal.competition().create(new_competition).await?;
    tracing::info!(competition_id = competition.id, "competition created");
    Ok((StatusCode::CREATED, Json(competition)))
}

pub async fn get_competition(
    State(state): State<AppState>,
    Path(competition_id): Path<i64>,
) -> Result<Json<CompetitionDetail>, ApiError> {
    state
        .dal
        .competition()
        .get_detail(competition_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Competition {competition_id} not found")))
}

/// Registers the caller. The response body is the stored payload, byte for
/// byte, on the first attempt and on every replay.
pub async fn register(
    State(state): State<AppState>,
    Path(competition_id): Path<i64>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let mut request = RegistrationRequest::new(competition_id, user.id);
    if let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) {
        let raw = raw
            .to_str()
            .map_err(|_| ApiError::BadRequest("Idempotency-Key must be ASCII".to_string()))?;
        request = request.with_idempotency_key(IdempotencyKey::parse(raw)?);
    }

    // Detached so a dropped connection cannot cancel the attempt between lock
    // acquisition and release.
    let orchestrator = state.orchestrator.clone();
    let receipt = tokio::spawn(async move { orchestrator.register(request).await })
        .await
        .map_err(|e| ApiError::Internal(format!("registration task failed: {e}")))??;

    let mut response = (
        StatusCode::CREATED,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        receipt.body,
    )
        .into_response();
    if receipt.replayed {
        response
            .headers_mut()
            .insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
    }
    Ok(response)
}

pub async fn withdraw(
    State(state): State<AppState>,
    Path(competition_id): Path<i64>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Registration>, ApiError> {
    state
        .orchestrator
        .withdraw(competition_id, user.id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No active registration for competition {competition_id}"
            ))
        })
}

pub async fn my_registrations(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<Registration>>, ApiError> {
    Ok(Json(state.dal.registration().list_for_user(user.id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MailboxQuery {
    limit: Option<i64>,
}

pub async fn my_mailbox(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<MailboxQuery>,
) -> Result<Json<Vec<MailboxMessage>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_MAILBOX_LIMIT)
        .clamp(1, MAX_PAGE_SIZE);
    Ok(Json(state.dal.mailbox().list_for_user(user.id, limit).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJobPage {
    pub items: Vec<FailedJob>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

pub async fn failed_jobs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FailedJobPage>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);

    let failed = state.dal.failed_job();
    let items = failed.list(per_page, (page - 1) * per_page).await?;
    let total = failed.count().await?;

    Ok(Json(FailedJobPage {
        items,
        total,
        page,
        per_page,
    }))
}
