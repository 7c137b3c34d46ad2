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

//! Error types shared across the registration, queue and storage layers.
//!
//! Each layer has its own `thiserror` enum. [`ErrorKind`] is the flat,
//! caller-facing classification used for metrics labels, logging and the HTTP
//! status mapping in the server.

use std::time::Duration;
use thiserror::Error;

/// Caller-facing classification of every failure the system can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The competition does not exist.
    NotFound,
    /// The registration deadline has passed.
    DeadlinePassed,
    /// No seats are left.
    CapacityExceeded,
    /// The user already holds a registration for the competition.
    AlreadyRegistered,
    /// Another registration for the same competition holds the lock.
    Busy,
    /// The idempotency key is owned by another request.
    Conflict,
    /// The registration transaction did not finish in time.
    TransactionTimeout,
    /// A worker precondition no longer holds. Not a failure.
    Skipped,
    /// Delivery failed; the queue will retry.
    DeliveryFailed,
    /// Delivery exhausted its attempts and was dead-lettered.
    Exhausted,
    /// Anything else (storage, pool, serialization).
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::DeadlinePassed => "deadline_passed",
            ErrorKind::CapacityExceeded => "capacity_exceeded",
            ErrorKind::AlreadyRegistered => "already_registered",
            ErrorKind::Busy => "busy",
            ErrorKind::Conflict => "conflict",
            ErrorKind::TransactionTimeout => "transaction_timeout",
            ErrorKind::Skipped => "skipped",
            ErrorKind::DeliveryFailed => "delivery_failed",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether a client may safely resubmit the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Busy
                | ErrorKind::Conflict
                | ErrorKind::TransactionTimeout
                | ErrorKind::DeliveryFailed
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the data access layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The pool could not hand out a connection, or the blocking interaction
    /// with it was aborted.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Input rejected before it reached the database.
    #[error("Invalid input: {0}")]
    Invalid(String),
}

impl StoreError {
    /// True for PostgreSQL `40001` aborts raised under serializable isolation.
    pub fn is_serialization_failure(&self) -> bool {
        matches!(
            self,
            StoreError::Database(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::SerializationFailure,
                _
            ))
        )
    }
}

/// Errors raised by the idempotency store.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// The key already holds a response.
    #[error("Idempotency key '{key}' already exists")]
    Conflict { key: String },

    #[error("Invalid idempotency key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by lock backends.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of a registration attempt, one variant per caller-visible kind.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Competition {competition_id} not found")]
    NotFound { competition_id: i64 },

    #[error("Registration deadline for competition {competition_id} has passed")]
    DeadlinePassed { competition_id: i64 },

    #[error("Competition {competition_id} is full ({capacity} seats)")]
    CapacityExceeded { competition_id: i64, capacity: i32 },

    #[error("User {user_id} is already registered for competition {competition_id}")]
    AlreadyRegistered { competition_id: i64, user_id: i64 },

    #[error("Registration in progress for competition {competition_id}, please try again")]
    Busy { competition_id: i64 },

    #[error("Idempotency key '{key}' is being handled by another request")]
    Conflict { key: String },

    #[error("Registration transaction exceeded {timeout:?}")]
    TransactionTimeout { timeout: Duration },

    #[error("User {user_id} not found")]
    UnknownUser { user_id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl RegistrationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistrationError::NotFound { .. } => ErrorKind::NotFound,
            RegistrationError::DeadlinePassed { .. } => ErrorKind::DeadlinePassed,
            RegistrationError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            RegistrationError::AlreadyRegistered { .. } => ErrorKind::AlreadyRegistered,
            RegistrationError::Busy { .. } => ErrorKind::Busy,
            RegistrationError::Conflict { .. } => ErrorKind::Conflict,
            RegistrationError::TransactionTimeout { .. } => ErrorKind::TransactionTimeout,
            RegistrationError::UnknownUser { .. } => ErrorKind::NotFound,
            RegistrationError::Store(_) | RegistrationError::Lock(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<IdempotencyError> for RegistrationError {
    fn from(e: IdempotencyError) -> Self {
        match e {
            IdempotencyError::Conflict { key } => RegistrationError::Conflict { key },
            IdempotencyError::InvalidKey(reason) => {
                RegistrationError::Store(StoreError::Invalid(reason))
            }
            IdempotencyError::Store(e) => RegistrationError::Store(e),
        }
    }
}

/// Errors raised by the notification queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The payload failed validation at enqueue or could not be decoded at
    /// dequeue.
    #[error("Invalid job payload for '{job_name}': {reason}")]
    InvalidPayload { job_name: String, reason: String },

    #[error("Unknown job type '{0}'")]
    UnknownJob(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised while delivering a notification. Always retryable.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Delivery channel failed: {0}")]
    Channel(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that stop a worker from processing a claimed batch.
///
/// Per-job delivery failures are not worker errors; they are recorded on the
/// job and retried.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Configuration validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Transaction timeout {transaction_timeout:?} must be strictly below lock TTL {lock_ttl:?}")]
    TimeoutNotBelowLockTtl {
        transaction_timeout: Duration,
        lock_ttl: Duration,
    },

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
