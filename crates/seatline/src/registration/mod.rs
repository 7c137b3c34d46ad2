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

//! The registration workflow.
//!
//! [`RegistrationOrchestrator::register`] ties the pieces together:
//!
//! 1. A stored response for the request's idempotency key is replayed as is.
//! 2. The per-competition lock is taken with a short TTL. Failing to take it
//!    is reported as `Busy`; the orchestrator never waits for it. Once held,
//!    the key is looked up again, since a racing request may have committed it
//!    in between.
//! 3. The guarded transaction runs under a deadline, re-running on
//!    serialization failures. It commits the registration and the idempotency
//!    record together. The deadline is checked inside the transaction, so a
//!    timeout always means nothing was committed.
//! 4. A confirmation job is enqueued.
//! 5. The lock is released on every path, including panics in steps 3 and 4.
//!
//! The lock only keeps concurrent attempts from piling onto the database. Seat
//! counts stay correct even if it lapses, because the transaction is
//! serializable.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RegistrationConfig;
use crate::dal::registration::{RegistrationAttempt, RegistrationCommit, TransactionDeadline};
use crate::dal::DAL;
use crate::error::{RegistrationError, StoreError};
use crate::idempotency::{IdempotencyKey, IdempotencyStore};
use crate::lock::{competition_lock_key, holder_token, DistributedLock};
use crate::metrics;
use crate::models::{
    NotificationJob, Registration, RegistrationConfirmation, RegistrationResponse,
};
use crate::queue::NotificationQueue;

mod request;

pub use request::{RegistrationReceipt, RegistrationRequest, RegistrationState};

#[derive(Debug, Clone)]
pub struct RegistrationOrchestrator {
    dal: DAL,
    idempotency: IdempotencyStore,
    lock: Arc<dyn DistributedLock>,
    queue: NotificationQueue,
    config: RegistrationConfig,
}

impl RegistrationOrchestrator {
    pub fn new(
        dal: DAL,
        lock: Arc<dyn DistributedLock>,
        queue: NotificationQueue,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            idempotency: IdempotencyStore::new(dal.clone()),
            dal,
            lock,
            queue,
            config,
        }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Registers a participant, or replays the stored response for a repeated
    /// idempotency key.
    #[instrument(
        skip(self, request),
        fields(competition_id = request.competition_id, user_id = request.user_id)
    )]
    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        let started = Instant::now();
        let mut state = RegistrationState::Start;

        let result = self.run(&request, &mut state).await;

        let outcome = match &result {
            Ok(receipt) if receipt.replayed => "replayed",
            Ok(_) => "success",
            Err(e) => {
                advance(&mut state, RegistrationState::Failed(e.kind()));
                e.kind().as_str()
            }
        };
        metrics::record_registration(outcome, started.elapsed().as_secs_f64());
        result
    }

    async fn run(
        &self,
        request: &RegistrationRequest,
        state: &mut RegistrationState,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        if let Some(key) = &request.idempotency_key {
            if let Some(receipt) = self.replay(key).await? {
                advance(state, RegistrationState::Done);
                return Ok(receipt);
            }
        }
        advance(state, RegistrationState::IdempotencyChecked);

        let lock_key = competition_lock_key(request.competition_id);
        let token = holder_token(request.user_id);
        if !self
            .lock
            .try_acquire(&lock_key, &token, self.config.lock_ttl())
            .await?
        {
            metrics::record_lock_contention();
            debug!(lock_key = %lock_key, "competition lock held elsewhere");
            return Err(RegistrationError::Busy {
                competition_id: request.competition_id,
            });
        }
        advance(state, RegistrationState::LockAcquired);

        // The request that held the lock before us may have committed this key.
        if let Some(key) = &request.idempotency_key {
            let stored = self.replay(key).await;
            if !matches!(stored, Ok(None)) {
                self.release(&lock_key, &token).await;
                advance(state, RegistrationState::LockReleased);
                if let Some(receipt) = stored? {
                    advance(state, RegistrationState::Done);
                    return Ok(receipt);
                }
            }
        }

        let guarded = AssertUnwindSafe(self.guarded(request, state))
            .catch_unwind()
            .await;

        self.release(&lock_key, &token).await;
        advance(state, RegistrationState::LockReleased);

        let receipt = match guarded {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        match receipt {
            // The key was committed by a concurrent request after our lookup.
            Err(RegistrationError::Conflict { key }) => {
                let key = IdempotencyKey::parse(key.clone())
                    .map_err(|_| RegistrationError::Conflict { key: key.clone() })?;
                match self.replay(&key).await? {
                    Some(receipt) => {
                        advance(state, RegistrationState::Done);
                        Ok(receipt)
                    }
                    None => Err(RegistrationError::Conflict {
                        key: key.as_str().to_string(),
                    }),
                }
            }
            Err(e) => Err(e),
            Ok(receipt) => {
                advance(state, RegistrationState::Done);
                Ok(receipt)
            }
        }
    }

    /// The work done while holding the competition lock.
    async fn guarded(
        &self,
        request: &RegistrationRequest,
        state: &mut RegistrationState,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        let commit = self.transact(request).await?;
        advance(state, RegistrationState::Transacted);

        let response = RegistrationResponse::from(&commit.participant);
        info!(
            registration_id = commit.participant.registration.id,
            "registration committed"
        );

        self.enqueue_confirmation(&commit).await;
        advance(state, RegistrationState::NotificationEnqueued);

        Ok(RegistrationReceipt::fresh(commit.response_body, response))
    }

    /// Runs the registration transaction under the configured deadline. The
    /// deadline covers re-runs after serialization failures too.
    ///
    /// The database call is always awaited to completion; the transaction
    /// itself rolls back once the deadline has passed.
    async fn transact(
        &self,
        request: &RegistrationRequest,
    ) -> Result<RegistrationCommit, RegistrationError> {
        let timeout = self.config.transaction_timeout();
        let deadline = TransactionDeadline::after(timeout);
        let retries = self.config.serialization_retries();

        for attempt_number in 0..=retries {
            if deadline.has_passed() {
                return Err(RegistrationError::TransactionTimeout { timeout });
            }

            let mut attempt = RegistrationAttempt::new(request.competition_id, request.user_id)
                .with_deadline(deadline);
            if let Some(key) = &request.idempotency_key {
                attempt = attempt.with_idempotency(key.as_str(), self.config.idempotency_ttl());
            }

            match self.dal.registration().register_participant(attempt).await {
                Err(RegistrationError::Store(e)) if e.is_serialization_failure() => {
                    metrics::record_serialization_retry();
                    debug!(
                        attempt = attempt_number + 1,
                        "serialization failure, re-running registration transaction"
                    );
                }
                other => return other,
            }
        }

        warn!(retries, "registration kept failing to serialize");
        Err(RegistrationError::Busy {
            competition_id: request.competition_id,
        })
    }

    /// Enqueues the confirmation for a committed registration.
    ///
    /// The registration is already durable here, so a queue failure is logged
    /// rather than reported to the client.
    async fn enqueue_confirmation(&self, commit: &RegistrationCommit) {
        let participant = &commit.participant;
        let job = NotificationJob::RegistrationConfirmation(RegistrationConfirmation {
            registration_id: participant.registration.id,
            user_id: participant.registration.user_id,
            competition_id: participant.registration.competition_id,
            user_email: participant.user_email.clone(),
            user_name: participant.user_name.clone(),
            competition_title: participant.competition_title.clone(),
        });

        if let Err(e) = self
            .queue
            .enqueue(&job, *self.config.confirmation_job())
            .await
        {
            metrics::record_job_enqueue_failure(job.name());
            error!(
                registration_id = participant.registration.id,
                "failed to enqueue registration confirmation: {}", e
            );
        }
    }

    async fn replay(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<RegistrationReceipt>, RegistrationError> {
        let Some(stored) = self.idempotency.lookup(key).await? else {
            return Ok(None);
        };
        metrics::record_idempotency_hit();
        debug!(key = %key, "replaying stored response");
        Ok(Some(RegistrationReceipt::replay(stored.body)?))
    }

    async fn release(&self, lock_key: &str, token: &str) {
        match self.lock.release(lock_key, token).await {
            Ok(true) => {}
            Ok(false) => {
                metrics::record_lock_release_miss();
                warn!(
                    lock_key,
                    "competition lock expired before release; the transaction outlived its TTL"
                );
            }
            Err(e) => error!(lock_key, "failed to release competition lock: {}", e),
        }
    }

    /// Withdraws a participant, freeing the seat. Returns `None` when the
    /// user holds no active registration for the competition.
    #[instrument(skip(self))]
    pub async fn withdraw(
        &self,
        competition_id: i64,
        user_id: i64,
    ) -> Result<Option<Registration>, StoreError> {
        let withdrawn = self
            .dal
            .registration()
            .withdraw(competition_id, user_id)
            .await?;
        if let Some(registration) = &withdrawn {
            info!(registration_id = registration.id, "registration withdrawn");
        }
        Ok(withdrawn)
    }
}

fn advance(state: &mut RegistrationState, next: RegistrationState) {
    debug!(from = ?state, to = ?next, "registration state");
    *state = next;
}
