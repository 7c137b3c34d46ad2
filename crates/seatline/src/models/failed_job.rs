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

//! Dead-lettered notification jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job that exhausted its attempts (or could not be decoded).
///
/// Durable: nothing in the core deletes these rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedJob {
    pub id: i64,
    /// Id the job had in the queue.
    pub job_id: i64,
    pub job_name: String,
    /// The original payload, verbatim.
    pub payload: String,
    pub error: String,
    pub attempts: i32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFailedJob {
    pub job_id: i64,
    pub job_name: String,
    pub payload: String,
    pub error: String,
    pub attempts: i32,
}
