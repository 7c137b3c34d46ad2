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

//! Registrations and the response returned to the registering client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            other => Err(StoreError::Invalid(format!(
                "unknown registration status '{other}'"
            ))),
        }
    }
}

/// A participant's seat in a competition.
///
/// A registration with `deleted_at` set is withdrawn: it no longer counts
/// toward capacity and no longer blocks a new registration by the same user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: i64,
    pub competition_id: i64,
    pub user_id: i64,
    pub status: RegistrationStatus,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Registration {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A freshly committed registration with the competition and user fields read
/// in the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredParticipant {
    pub registration: Registration,
    pub competition_title: String,
    pub user_email: String,
    pub user_name: String,
}

/// The body returned to a client whose registration succeeded.
///
/// Serialized once with [`RegistrationResponse::to_canonical_json`] and stored
/// under the idempotency key, so replays return the exact same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: i64,
    pub competition_id: i64,
    pub user_id: i64,
    pub registered_at: DateTime<Utc>,
    pub competition_title: String,
}

impl RegistrationResponse {
    pub fn to_canonical_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&RegisteredParticipant> for RegistrationResponse {
    fn from(participant: &RegisteredParticipant) -> Self {
        Self {
            id: participant.registration.id,
            competition_id: participant.registration.competition_id,
            user_id: participant.registration.user_id,
            registered_at: participant.registration.created_at,
            competition_title: participant.competition_title.clone(),
        }
    }
}
