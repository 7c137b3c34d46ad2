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

//! Diesel table definitions shared by both backends.
//!
//! Only types with identical representations on PostgreSQL and SQLite are used
//! so one set of definitions serves both. Timestamps are naive UTC. Tag sets and
//! job payloads are JSON text.

diesel::table! {
    users (id) {
        id -> BigInt,
        email -> Text,
        name -> Text,
        role -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    competitions (id) {
        id -> BigInt,
        title -> Text,
        description -> Text,
        tags -> Text,
        capacity -> Integer,
        registration_deadline -> Timestamp,
        start_at -> Nullable<Timestamp>,
        organizer_id -> BigInt,
        created_at -> Timestamp,
    }
}

diesel::table! {
    registrations (id) {
        id -> BigInt,
        competition_id -> BigInt,
        user_id -> BigInt,
        status -> Text,
        created_at -> Timestamp,
        deleted_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    idempotency_keys (key) {
        key -> Text,
        response -> Text,
        expires_at -> Timestamp,
        created_at -> Timestamp,
    }
}

diesel::table! {
    notification_jobs (id) {
        id -> BigInt,
        job_name -> Text,
        payload -> Text,
        attempts_made -> Integer,
        max_attempts -> Integer,
        backoff_kind -> Text,
        backoff_delay_ms -> BigInt,
        remove_on_success -> Bool,
        available_at -> Timestamp,
        locked_until -> Nullable<Timestamp>,
        locked_by -> Nullable<Text>,
        last_error -> Nullable<Text>,
        completed_at -> Nullable<Timestamp>,
        created_at -> Timestamp,
    }
}

diesel::table! {
    failed_jobs (id) {
        id -> BigInt,
        job_id -> BigInt,
        job_name -> Text,
        payload -> Text,
        error -> Text,
        attempts -> Integer,
        failed_at -> Timestamp,
    }
}

diesel::table! {
    mailbox (id) {
        id -> BigInt,
        user_id -> BigInt,
        recipient -> Text,
        kind -> Text,
        subject -> Text,
        body -> Text,
        created_at -> Timestamp,
    }
}

diesel::table! {
    competition_locks (key) {
        key -> Text,
        token -> Text,
        expires_at -> Timestamp,
    }
}

diesel::joinable!(competitions -> users (organizer_id));
diesel::joinable!(registrations -> competitions (competition_id));
diesel::joinable!(registrations -> users (user_id));
diesel::joinable!(mailbox -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    competition_locks,
    competitions,
    failed_jobs,
    idempotency_keys,
    mailbox,
    notification_jobs,
    registrations,
    users,
);
