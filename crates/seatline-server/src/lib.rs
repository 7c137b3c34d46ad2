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


//! # Seatline server
//!
//! The HTTP surface over the Seatline library: routes, the identity and role
//! guard chain, and configuration loading. The binary in `main.rs` is the
//! composition root that owns the database pool, the lock store, the worker
//! pool and the scheduler.
//!
//! Middleware runs in this order for every guarded route:
//!
//! ```text
//! trace -> body limit -> identify (401) -> require_role (403) -> handler
//! ```

use axum::http::Request;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use seatline::models::Role;
use seatline::registration::RegistrationOrchestrator;
use seatline::DAL;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

pub use config::ServerConfig;
pub use error::ApiError;

const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared handler state. Cloned per request; every field is a cheap handle.
#[derive(Debug, Clone)]
pub struct AppState {
    pub dal: DAL,
    pub orchestrator: RegistrationOrchestrator,
    max_body_bytes: usize,
}

impl AppState {
    pub fn new(dal: DAL, orchestrator: RegistrationOrchestrator) -> Self {
        Self {
            dal,
            orchestrator,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

pub fn router(state: AppState) -> Router {
    let organizer = Router::new()
        .route("/competitions", post(routes::create_competition))
        .route_layer(from_fn_with_state(Role::Organizer, auth::require_role));

    let participant = Router::new()
        .route(
            "/competitions/{id}/register",
            post(routes::register).delete(routes::withdraw),
        )
        .route_layer(from_fn_with_state(Role::Participant, auth::require_role));

    let admin = Router::new()
        .route("/admin/failed-jobs", get(routes::failed_jobs))
        .route_layer(from_fn_with_state(Role::Admin, auth::require_role));

    let any_user = Router::new()
        .route("/users/me/registrations", get(routes::my_registrations))
        .route("/users/me/mailbox", get(routes::my_mailbox));

    let authenticated = organizer
        .merge(participant)
        .merge(admin)
        .merge(any_user)
        .route_layer(from_fn_with_state(state.clone(), auth::identify));

    let public = Router::new()
        .route("/health", get(routes::health))
        .route("/competitions/{id}", get(routes::get_competition));

    let max_body_bytes = state.max_body_bytes;
    public
        .merge(authenticated)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                tracing::info_span!(
                    "http_request",
                    request_id = %uuid::Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                    user_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
