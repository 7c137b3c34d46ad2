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
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::DistributedLock;
use crate::error::LockError;

#[derive(Debug, Clone)]
struct Entry {
    holder: String,
    expires_at: Instant,
}

/// Process-local lock store.
///
/// Expiry uses `tokio::time::Instant`, so tests can drive it with
/// `tokio::time::pause` and `advance`. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current holder of `key`, ignoring expired entries.
    pub fn holder(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.holder.clone())
    }
}

#[async_trait]
impl DistributedLock for InMemoryLockStore {
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(key) {
            if existing.expires_at > now {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                holder: holder.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(existing) if existing.holder == holder && existing.expires_at > now => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self) -> Result<usize, LockError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        Ok(before - entries.len())
    }
}
