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


//! Identity and role guard middleware.
//!
//! Authentication happens upstream. The proxy in front of the server passes the
//! authenticated user's id in `x-user-id`; [`identify`] loads that user and
//! stores it in the request extensions, and [`require_role`] rejects callers
//! whose role does not match the route.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use seatline::models::{Role, User};

use crate::error::ApiError;
use crate::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, placed in request extensions by [`identify`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub async fn identify(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing or malformed user identity".to_string()))?;

    let user = state
        .dal
        .user()
        .get(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(format!("Unknown user {user_id}")))?;

    tracing::Span::current().record("user_id", user.id);
    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

/// Must run after [`identify`].
pub async fn require_role(
    State(role): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::Unauthorized("Missing user identity".to_string()))?;

    if caller.0.role != role {
        return Err(ApiError::Forbidden(format!(
            "Requires role '{}', caller has '{}'",
            role, caller.0.role
        )));
    }
    Ok(next.run(request).await)
}
