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

use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

use super::DistributedLock;
use crate::dal::DAL;
use crate::error::LockError;

/// Lock store on the `competition_locks` table.
///
/// Expiry is wall-clock based, so hosts sharing the database need roughly
/// synchronized clocks.
#[derive(Debug, Clone)]
pub struct DatabaseLockStore {
    dal: DAL,
}

impl DatabaseLockStore {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }
}

#[async_trait]
impl DistributedLock for DatabaseLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError> {
        Ok(self
            .dal
            .lock()
            .try_acquire(key, holder, ttl, Utc::now())
            .await?)
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        Ok(self.dal.lock().release(key, holder).await?)
    }

    async fn purge_expired(&self) -> Result<usize, LockError> {
        Ok(self.dal.lock().purge_expired(Utc::now()).await?)
    }
}
