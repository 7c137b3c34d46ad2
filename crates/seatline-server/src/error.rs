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


//! HTTP error mapping.
//!
//! Every failure leaves the server as a JSON body
//! `{"error": <kind>, "message": <text>, "retryable": <bool>}` with the status
//! the kind maps to.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use seatline::error::IdempotencyError;
use seatline::{ErrorKind, RegistrationError, StoreError};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    retryable: bool,
}

impl From<IdempotencyError> for ApiError {
    fn from(e: IdempotencyError) -> Self {
        match e {
            IdempotencyError::InvalidKey(reason) => {
                ApiError::BadRequest(format!("Invalid Idempotency-Key header: {reason}"))
            }
            other => ApiError::Registration(other.into()),
        }
    }
}

/// Status for a registration failure kind.
pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DeadlinePassed | ErrorKind::CapacityExceeded => StatusCode::BAD_REQUEST,
        ErrorKind::AlreadyRegistered | ErrorKind::Busy | ErrorKind::Conflict => {
            StatusCode::CONFLICT
        }
        ErrorKind::TransactionTimeout => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Skipped
        | ErrorKind::DeliveryFailed
        | ErrorKind::Exhausted
        | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Registration(e) => status_for_kind(e.kind()),
            ApiError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Invalid(_)) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Registration(e) => e.kind().as_str(),
            ApiError::Store(StoreError::NotFound { .. }) | ApiError::NotFound(_) => "not_found",
            ApiError::Store(StoreError::Invalid(_)) | ApiError::BadRequest(_) => "bad_request",
            ApiError::Store(_) | ApiError::Internal(_) => "internal",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            ApiError::Registration(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        // Internal details stay in the log.
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        metrics::counter!("seatline_api_errors_total", "code" => code).increment(1);

        let body = ErrorBody {
            error: code,
            message,
            retryable: self.retryable(),
        };
        let mut response = (status, Json(body)).into_response();
        if self.retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}
