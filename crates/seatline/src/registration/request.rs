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

use crate::error::{ErrorKind, StoreError};
use crate::idempotency::IdempotencyKey;
use crate::models::RegistrationResponse;

/// One registration attempt as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub competition_id: i64,
    pub user_id: i64,
    pub idempotency_key: Option<IdempotencyKey>,
}

impl RegistrationRequest {
    pub fn new(competition_id: i64, user_id: i64) -> Self {
        Self {
            competition_id,
            user_id,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }
}

/// The response returned to the client.
///
/// `body` is the exact serialized payload. A replayed receipt carries the
/// bytes stored on the first successful attempt, unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReceipt {
    pub body: String,
    pub response: RegistrationResponse,
    pub replayed: bool,
}

impl RegistrationReceipt {
    pub(crate) fn fresh(body: String, response: RegistrationResponse) -> Self {
        Self {
            body,
            response,
            replayed: false,
        }
    }

    pub(crate) fn replay(body: String) -> Result<Self, StoreError> {
        let response = serde_json::from_str(&body)?;
        Ok(Self {
            body,
            response,
            replayed: true,
        })
    }
}

/// Progress of one registration attempt.
///
/// ```text
/// Start -> IdempotencyChecked -> LockAcquired -> Transacted
///       -> NotificationEnqueued -> LockReleased -> Done
/// ```
///
/// An idempotency hit goes straight from `Start` to `Done`. Any step may exit
/// to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Start,
    IdempotencyChecked,
    LockAcquired,
    Transacted,
    NotificationEnqueued,
    LockReleased,
    Done,
    Failed(ErrorKind),
}
