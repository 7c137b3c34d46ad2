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

//! Work distribution: how idle workers wait for jobs.
//!
//! Workers call [`WorkDistributor::wait_for_work`] between empty polls. The
//! polling distributor wakes on a fixed interval or when a job is enqueued in
//! the same process. Jobs enqueued by another process are picked up on the
//! next interval. Stopping workers is the worker pool's concern, not the
//! distributor's.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

#[async_trait]
pub trait WorkDistributor: Send + Sync + std::fmt::Debug {
    /// Waits until work might be available, or the poll interval elapses.
    ///
    /// Callers must handle finding no work after this returns.
    async fn wait_for_work(&self);

    /// Wakes waiters because work was just enqueued.
    fn notify_work(&self);
}

/// Interval-polling distributor with in-process wakeups.
#[derive(Debug, Clone)]
pub struct PollingDistributor {
    poll_interval: Duration,
    notify: Arc<Notify>,
}

impl PollingDistributor {
    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            notify: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl WorkDistributor for PollingDistributor {
    async fn wait_for_work(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => {
                debug!("poll interval elapsed");
            }
            _ = self.notify.notified() => {
                debug!("distributor woken");
            }
        }
    }

    fn notify_work(&self) {
        self.notify.notify_waiters();
    }
}
