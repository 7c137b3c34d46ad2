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

//! Metrics emitted through the `metrics` facade.
//!
//! Names follow `seatline_{subsystem}_{name}_{unit}`; counters end in
//! `_total`. No exporter is installed here: the embedding process picks one.

use metrics::{counter, histogram};

const REGISTRATIONS_TOTAL: &str = "seatline_registrations_total";
const REGISTRATION_LATENCY: &str = "seatline_registration_latency_seconds";
const IDEMPOTENCY_HITS: &str = "seatline_idempotency_hits_total";
const LOCK_CONTENTION: &str = "seatline_lock_contention_total";
const LOCK_RELEASE_MISSES: &str = "seatline_lock_release_misses_total";
const SERIALIZATION_RETRIES: &str = "seatline_serialization_retries_total";

const JOBS_ENQUEUED: &str = "seatline_jobs_enqueued_total";
const JOB_ENQUEUE_FAILURES: &str = "seatline_job_enqueue_failures_total";
const JOB_OUTCOMES: &str = "seatline_job_outcomes_total";
const DEAD_LETTER_WRITE_FAILURES: &str = "seatline_dead_letter_write_failures_total";

const MAINTENANCE_PURGED: &str = "seatline_maintenance_purged_total";

/// Records the outcome of one registration attempt. `outcome` is
/// `"success"`, `"replayed"`, or an error kind.
#[inline]
pub fn record_registration(outcome: &'static str, latency_secs: f64) {
    counter!(REGISTRATIONS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(REGISTRATION_LATENCY, "outcome" => outcome).record(latency_secs);
}

#[inline]
pub fn record_idempotency_hit() {
    counter!(IDEMPOTENCY_HITS).increment(1);
}

#[inline]
pub fn record_lock_contention() {
    counter!(LOCK_CONTENTION).increment(1);
}

/// A release found the lock expired or taken over by another holder.
#[inline]
pub fn record_lock_release_miss() {
    counter!(LOCK_RELEASE_MISSES).increment(1);
}

#[inline]
pub fn record_serialization_retry() {
    counter!(SERIALIZATION_RETRIES).increment(1);
}

#[inline]
pub fn record_job_enqueued(job_name: &str) {
    counter!(JOBS_ENQUEUED, "job" => job_name.to_string()).increment(1);
}

/// A job that could not be enqueued and will never run.
#[inline]
pub fn record_job_enqueue_failure(job_name: &str) {
    counter!(JOB_ENQUEUE_FAILURES, "job" => job_name.to_string()).increment(1);
}

/// `outcome` is one of `completed`, `skipped`, `retried`, `dead_lettered`.
#[inline]
pub fn record_job_outcome(job_name: &str, outcome: &'static str) {
    counter!(JOB_OUTCOMES, "job" => job_name.to_string(), "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_dead_letter_write_failure(job_name: &str) {
    counter!(DEAD_LETTER_WRITE_FAILURES, "job" => job_name.to_string()).increment(1);
}

#[inline]
pub fn record_maintenance_purged(target: &'static str, count: usize) {
    counter!(MAINTENANCE_PURGED, "target" => target).increment(count as u64);
}
