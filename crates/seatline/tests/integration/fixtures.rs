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

//! Test fixture: a fresh, migrated SQLite database per test.
//!
//! Every fixture owns its own temporary directory, so tests never share rows
//! and can run in parallel.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use diesel::connection::Connection;
use diesel::sqlite::SqliteConnection;
use seatline::config::{Backoff, JobOptions};
use seatline::lock::InMemoryLockStore;
use seatline::models::{Competition, NewCompetition, NewUser, Role, User};
use seatline::queue::NotificationQueue;
use seatline::registration::RegistrationOrchestrator;
use seatline::{Database, RegistrationConfig, WorkerConfig, DAL};
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

static INIT: Once = Once::new();

pub struct TestFixture {
    pub dal: DAL,
    db_path: String,
    _dir: TempDir,
}

impl TestFixture {
    pub async fn new() -> Self {
        INIT.call_once(|| seatline::init_logging(None));

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("seatline.db").display().to_string();
        let url = format!("sqlite://{}", db_path);
        let database = Database::try_new(&url, 1).expect("Failed to create database");
        database
            .run_migrations()
            .await
            .expect("Failed to run migrations");

        Self {
            dal: DAL::new(database),
            db_path,
            _dir: dir,
        }
    }

    /// Opens a separate connection to the fixture database, outside the pool.
    pub fn raw_connection(&self) -> SqliteConnection {
        SqliteConnection::establish(&self.db_path).expect("Failed to open raw connection")
    }

    /// Takes the SQLite write lock on a separate connection and keeps it for
    /// `duration`. Returns once the lock is held.
    pub async fn hold_write_lock(&self, duration: std::time::Duration) -> JoinHandle<()> {
        let mut conn = self.raw_connection();
        let (locked_tx, locked_rx) = oneshot::channel();
        let handle = tokio::task::spawn_blocking(move || {
            conn.immediate_transaction::<_, diesel::result::Error, _>(|_| {
                let _ = locked_tx.send(());
                std::thread::sleep(duration);
                Ok(())
            })
            .expect("Write lock holder failed");
        });
        locked_rx.await.expect("Write lock was never taken");
        handle
    }

    pub fn queue(&self) -> NotificationQueue {
        NotificationQueue::with_polling(self.dal.clone(), WorkerConfig::default().poll_interval())
    }

    pub fn orchestrator(&self) -> RegistrationOrchestrator {
        self.orchestrator_with(Arc::new(InMemoryLockStore::new()), RegistrationConfig::default())
    }

    pub fn orchestrator_with(
        &self,
        lock: Arc<InMemoryLockStore>,
        config: RegistrationConfig,
    ) -> RegistrationOrchestrator {
        RegistrationOrchestrator::new(self.dal.clone(), lock, self.queue(), config)
    }

    pub async fn user(&self, name: &str, role: Role) -> User {
        self.dal
            .user()
            .create(NewUser::new(
                format!("{}@example.com", name.to_lowercase()),
                name,
                role,
            ))
            .await
            .expect("Failed to create user")
    }

    pub async fn participant(&self, name: &str) -> User {
        self.user(name, Role::Participant).await
    }

    pub async fn participants(&self, count: usize) -> Vec<User> {
        let mut users = Vec::with_capacity(count);
        for n in 0..count {
            users.push(self.participant(&format!("Participant{n}")).await);
        }
        users
    }

    pub async fn competition(&self, capacity: i32) -> Competition {
        self.competition_with(capacity, Utc::now() + Duration::days(7), None)
            .await
    }

    pub async fn competition_with(
        &self,
        capacity: i32,
        registration_deadline: DateTime<Utc>,
        start_at: Option<DateTime<Utc>>,
    ) -> Competition {
        let organizer = self
            .user(&format!("Organizer{}", uuid::Uuid::new_v4().simple()), Role::Organizer)
            .await;
        self.dal
            .competition()
            .create(NewCompetition {
                title: "Open Chess".to_string(),
                description: "Rapid, nine rounds".to_string(),
                tags: vec!["chess".to_string()],
                capacity,
                registration_deadline,
                start_at,
                organizer_id: organizer.id,
            })
            .await
            .expect("Failed to create competition")
    }
}

/// Job options that retry immediately, for driving jobs to exhaustion.
pub fn immediate_retries(attempts: u32) -> JobOptions {
    JobOptions {
        attempts,
        backoff: Backoff::Fixed {
            delay: std::time::Duration::ZERO,
        },
        remove_on_success: true,
    }
}
