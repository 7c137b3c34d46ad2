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

//! Cleanup sweeps that run outside the request path.
//!
//! Each sweep takes an explicit cutoff so it can be driven by the scheduler,
//! by the CLI, or by a test with a fixed clock. A failed sweep only delays
//! cleanup; registration traffic never waits on it.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::dal::{chrono_duration, DAL};
use crate::error::{LockError, StoreError};
use crate::lock::DistributedLock;
use crate::metrics;

#[derive(Debug, Clone)]
pub struct MaintenanceSweeper {
    dal: DAL,
    lock: Arc<dyn DistributedLock>,
}

impl MaintenanceSweeper {
    pub fn new(dal: DAL, lock: Arc<dyn DistributedLock>) -> Self {
        Self { dal, lock }
    }

    /// Deletes idempotency records that expired before `now`.
    pub async fn purge_idempotency(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.dal.idempotency().purge_expired(now).await?;
        info!(purged, "expired idempotency keys purged");
        metrics::record_maintenance_purged("idempotency_keys", purged);
        Ok(purged)
    }

    /// Hard-deletes registrations soft-deleted before `cutoff`.
    pub async fn purge_registrations(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.dal.registration().purge_deleted_before(cutoff).await?;
        info!(purged, cutoff = %cutoff, "withdrawn registrations purged");
        metrics::record_maintenance_purged("registrations", purged);
        Ok(purged)
    }

    /// Purges registrations withdrawn more than `retention` before `now`.
    pub async fn purge_registrations_older_than(
        &self,
        now: DateTime<Utc>,
        retention: Duration,
    ) -> Result<usize, StoreError> {
        self.purge_registrations(now - chrono_duration(retention))
            .await
    }

    /// Drops expired lock entries.
    pub async fn purge_locks(&self) -> Result<usize, LockError> {
        let purged = self.lock.purge_expired().await?;
        if purged > 0 {
            info!(purged, "expired competition locks purged");
        }
        metrics::record_maintenance_purged("locks", purged);
        Ok(purged)
    }
}
