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

//! Per-competition mutual exclusion with expiry.
//!
//! The lock only reduces contention in front of the registration transaction;
//! the transaction itself is what keeps capacity correct. Implementations
//! must provide:
//!
//! - acquisition as one atomic set-if-absent-with-expiry, never blocking or
//!   retrying internally
//! - release as one atomic compare-and-delete, so a holder whose lock expired
//!   and was re-acquired by someone else cannot delete the new holder's lock
//!
//! Two backends are provided:
//!
//! - [`InMemoryLockStore`] for a single process and for tests
//! - [`DatabaseLockStore`] for processes sharing one database
//!
//! # Example
//!
//! ```rust,ignore
//! use seatline::lock::{competition_lock_key, holder_token, DistributedLock, InMemoryLockStore};
//! use std::time::Duration;
//!
//! let locks = InMemoryLockStore::new();
//! let key = competition_lock_key(42);
//! let token = holder_token(7);
//!
//! if locks.try_acquire(&key, &token, Duration::from_secs(5)).await? {
//!     // ... guarded work ...
//!     locks.release(&key, &token).await?;
//! }
//! ```

use async_trait::async_trait;
use std::time::Duration;

use crate::error::LockError;

mod database;
mod memory;

pub use database::DatabaseLockStore;
pub use memory::InMemoryLockStore;

/// A mutual-exclusion store keyed by string.
#[async_trait]
pub trait DistributedLock: Send + Sync + std::fmt::Debug {
    /// Sets `key` to `holder` with a TTL if and only if the key is free or
    /// expired. Returns whether the lock was acquired.
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError>;

    /// Deletes `key` if and only if `holder` still owns it. Returns whether a
    /// lock was deleted.
    async fn release(&self, key: &str, holder: &str) -> Result<bool, LockError>;

    /// Drops expired entries. Returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, LockError>;
}

/// The lock key guarding registrations for one competition.
pub fn competition_lock_key(competition_id: i64) -> String {
    format!("lock:competition:{competition_id}")
}

/// A holder token unique to one acquisition attempt.
///
/// Built from the requester, the current time, and a random suffix so two
/// attempts by the same user in the same millisecond still differ.
pub fn holder_token(user_id: i64) -> String {
    format!(
        "{}-{}-{}",
        user_id,
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}
