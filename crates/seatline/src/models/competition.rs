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

//! Competitions: the capacity-limited resource participants register for.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A published competition.
///
/// `capacity` is the immutable upper bound on non-deleted registrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Unordered tag set, stored sorted and without duplicates.
    pub tags: Vec<String>,
    pub capacity: i32,
    pub registration_deadline: DateTime<Utc>,
    pub start_at: Option<DateTime<Utc>>,
    pub organizer_id: i64,
    pub created_at: DateTime<Utc>,
}

impl Competition {
    /// Whether registration is still open at `now`. The deadline instant itself
    /// is still open.
    pub fn accepts_registrations_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.registration_deadline
    }
}

/// Input for creating a competition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompetition {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub capacity: i32,
    pub registration_deadline: DateTime<Utc>,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub organizer_id: i64,
}

impl NewCompetition {
    /// Rejects empty text fields and non-positive capacity, and normalizes
    /// the tag set.
    pub fn validate(mut self) -> Result<Self, StoreError> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        if self.title.is_empty() {
            return Err(StoreError::Invalid("title must not be empty".to_string()));
        }
        if self.description.is_empty() {
            return Err(StoreError::Invalid(
                "description must not be empty".to_string(),
            ));
        }
        if self.capacity < 1 {
            return Err(StoreError::Invalid(
                "capacity must be at least 1".to_string(),
            ));
        }
        self.tags = normalize_tags(self.tags);
        Ok(self)
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut tags: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    tags.sort();
    tags.dedup();
    tags
}

/// A competition together with its live seat accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionDetail {
    #[serde(flatten)]
    pub competition: Competition,
    pub registered_count: i64,
    pub seats_left: i64,
}

impl CompetitionDetail {
    pub fn new(competition: Competition, registered_count: i64) -> Self {
        let seats_left = (competition.capacity as i64 - registered_count).max(0);
        Self {
            competition,
            registered_count,
            seats_left,
        }
    }
}
