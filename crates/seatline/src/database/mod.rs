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

//! Database connectivity, schema and embedded migrations.

pub mod connection;
pub mod schema;

pub use connection::{AnyPool, BackendType, Database, DatabaseError};

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

#[cfg(feature = "postgres")]
pub const POSTGRES_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/postgres");

#[cfg(feature = "sqlite")]
pub const SQLITE_MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

/// Runs pending PostgreSQL migrations on a raw connection.
#[cfg(feature = "postgres")]
pub fn run_migrations_postgres(
    conn: &mut diesel::PgConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    conn.run_pending_migrations(POSTGRES_MIGRATIONS)?;
    Ok(())
}

/// Runs pending SQLite migrations on a raw connection.
#[cfg(feature = "sqlite")]
pub fn run_migrations_sqlite(
    conn: &mut diesel::SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    conn.run_pending_migrations(SQLITE_MIGRATIONS)?;
    Ok(())
}
