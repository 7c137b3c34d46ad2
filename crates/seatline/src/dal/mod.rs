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

//! Data Access Layer with runtime backend selection.
//!
//! Every operation dispatches on the backend of the underlying [`Database`].
//! Queries that are identical on both backends are written once and expanded
//! per backend by [`with_connection!`]. Operations whose SQL or transaction
//! semantics differ (the serializable registration transaction, queue
//! claiming, lock acquisition) have separate `_postgres` / `_sqlite` methods
//! selected with [`dispatch_backend!`].
//!
//! # Example
//!
//! ```rust,ignore
//! use seatline::dal::DAL;
//! use seatline::database::Database;
//!
//! let db = Database::try_new("sqlite://seatline.db", 1)?;
//! let dal = DAL::new(db);
//!
//! let detail = dal.competition().get_detail(competition_id).await?;
//! ```

use crate::database::{AnyPool, BackendType, Database};

pub mod competition;
pub mod failed_job;
pub mod idempotency;
pub mod lock;
pub mod mailbox;
pub mod models;
pub mod notification_job;
pub mod registration;
pub mod user;

pub use competition::CompetitionDAL;
pub use failed_job::FailedJobDAL;
pub use idempotency::IdempotencyDAL;
pub use lock::LockDAL;
pub use mailbox::MailboxDAL;
pub use notification_job::{NewNotificationJob, NotificationJobDAL};
pub use registration::RegistrationDAL;
pub use user::UserDAL;

/// Dispatches to one of two backend-specific expressions.
///
/// ```rust,ignore
/// crate::dispatch_backend!(
///     self.dal.backend(),
///     self.claim_postgres(limit).await,
///     self.claim_sqlite(limit).await
/// )
/// ```
#[macro_export]
macro_rules! dispatch_backend {
    ($backend:expr, $pg_expr:expr, $sqlite_expr:expr) => {
        match $backend {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => $pg_expr,
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => $sqlite_expr,
        }
    };
}

/// Runs one blocking Diesel closure on a pooled connection of whichever
/// backend the DAL uses.
///
/// The closure body is expanded once per backend, so it must only use query
/// builder features both backends support. Pool failures return early with
/// `StoreError::ConnectionPool`; the closure's own `QueryResult` is the value of
/// the macro.
///
/// ```rust,ignore
/// let rows = crate::with_connection!(self.dal, |conn| {
///     users::table.select(UserRow::as_select()).load(conn)
/// })?;
/// ```
#[macro_export]
macro_rules! with_connection {
    ($dal:expr, |$conn:ident| $body:expr) => {
        match $dal.backend() {
            #[cfg(feature = "postgres")]
            $crate::database::BackendType::Postgres => {
                let pooled = $dal.database().get_postgres_connection().await?;
                pooled
                    .interact(move |$conn| $body)
                    .await
                    .map_err(|e| $crate::error::StoreError::ConnectionPool(e.to_string()))?
            }
            #[cfg(feature = "sqlite")]
            $crate::database::BackendType::Sqlite => {
                let pooled = $dal.database().get_sqlite_connection().await?;
                pooled
                    .interact(move |$conn| $body)
                    .await
                    .map_err(|e| $crate::error::StoreError::ConnectionPool(e.to_string()))?
            }
        }
    };
}

/// The Data Access Layer.
///
/// `DAL` is `Clone`; clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    pub database: Database,
}

impl DAL {
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn pool(&self) -> AnyPool {
        self.database.pool()
    }

    pub fn user(&self) -> UserDAL {
        UserDAL::new(self)
    }

    pub fn competition(&self) -> CompetitionDAL {
        CompetitionDAL::new(self)
    }

    pub fn registration(&self) -> RegistrationDAL {
        RegistrationDAL::new(self)
    }

    pub fn idempotency(&self) -> IdempotencyDAL {
        IdempotencyDAL::new(self)
    }

    pub fn notification_job(&self) -> NotificationJobDAL {
        NotificationJobDAL::new(self)
    }

    pub fn failed_job(&self) -> FailedJobDAL {
        FailedJobDAL::new(self)
    }

    pub fn mailbox(&self) -> MailboxDAL {
        MailboxDAL::new(self)
    }

    pub fn lock(&self) -> LockDAL {
        LockDAL::new(self)
    }
}

/// Current time as stored in timestamp columns.
pub(crate) fn now_naive() -> chrono::NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Converts a `Duration` into a chrono offset, capped at 100 years.
pub(crate) fn chrono_duration(duration: std::time::Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}
