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

//! Write-once response cache keyed by client idempotency tokens.
//!
//! A key maps to the exact response body first committed under it. Lookups
//! return that body verbatim, including after the record's expiry: expiry only
//! makes a record eligible for the maintenance sweep and is never checked on
//! the read path.
//!
//! Keys are opaque. No case folding or whitespace trimming is applied, so
//! `"abc"` and `"ABC "` are different keys.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

use crate::dal::DAL;
use crate::error::IdempotencyError;

/// Longest key accepted, in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// A client-supplied idempotency token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Accepts any non-empty token up to [`MAX_KEY_LEN`] bytes, unchanged.
    pub fn parse(raw: impl Into<String>) -> Result<Self, IdempotencyError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(IdempotencyError::InvalidKey(
                "key must not be empty".to_string(),
            ));
        }
        if raw.len() > MAX_KEY_LEN {
            return Err(IdempotencyError::InvalidKey(format!(
                "key exceeds {MAX_KEY_LEN} bytes"
            )));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A previously committed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub body: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredResponse {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Idempotency store backed by the `idempotency_keys` table.
///
/// The registration transaction writes its record directly through the DAL so
/// the record commits atomically with the registration; this type serves
/// lookups and standalone writes.
#[derive(Clone, Debug)]
pub struct IdempotencyStore {
    dal: DAL,
}

impl IdempotencyStore {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    pub async fn lookup(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<StoredResponse>, IdempotencyError> {
        let record = self.dal.idempotency().get(key.as_str()).await?;
        if record.is_some() {
            debug!(key = %key, "idempotency hit");
        }
        Ok(record.map(|r| StoredResponse {
            body: r.response,
            expires_at: r.expires_at,
        }))
    }

    /// Stores `response` under `key`. Fails with `Conflict` if the key already
    /// holds a response; the existing response is never overwritten.
    pub async fn store(
        &self,
        key: &IdempotencyKey,
        response: &str,
        ttl: Duration,
    ) -> Result<(), IdempotencyError> {
        let inserted = self
            .dal
            .idempotency()
            .insert_if_absent(key.as_str(), response, ttl)
            .await?;
        if inserted {
            Ok(())
        } else {
            Err(IdempotencyError::Conflict {
                key: key.as_str().to_string(),
            })
        }
    }

    /// Deletes records that expired before `now`. Returns how many were
    /// removed.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IdempotencyError> {
        Ok(self.dal.idempotency().purge_expired(now).await?)
    }
}
