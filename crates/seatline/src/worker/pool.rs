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

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::NotificationWorker;

/// A set of worker loops sharing one shutdown signal.
///
/// Loops are independent: each claims its own batches under its own worker
/// id, so a slow delivery in one loop does not hold up the others.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl WorkerPool {
    /// Spawns `worker.config().concurrency()` loops on the current runtime.
    pub fn spawn(worker: NotificationWorker) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let concurrency = worker.config().concurrency();

        let handles = (0..concurrency)
            .map(|n| {
                let worker = worker.with_worker_id(format!("{}-{}", worker.worker_id(), n));
                let shutdown_rx = shutdown_tx.subscribe();
                tokio::spawn(async move { worker.run(shutdown_rx).await })
            })
            .collect();

        info!(concurrency, "worker pool started");
        Self {
            handles,
            shutdown_tx,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signals every loop to stop and waits for in-flight batches to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("worker loop panicked: {}", e);
            }
        }
        info!("worker pool stopped");
    }
}
