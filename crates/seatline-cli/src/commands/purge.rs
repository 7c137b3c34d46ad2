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


//! Implementation of the `admin purge-*` commands.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use seatline::lock::DatabaseLockStore;
use seatline::maintenance::MaintenanceSweeper;
use seatline::DAL;
use std::sync::Arc;
use tracing::info;

/// Parse a duration string like "90d", "30d", "24h", "7d12h" into a chrono::Duration.
///
/// Units are `d`, `h`, `m` and `s`; case is ignored.
fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let mut total = Duration::zero();
    let mut digits = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        if digits.is_empty() {
            return Err(anyhow!(
                "Invalid duration format: expected number before '{}'",
                c
            ));
        }

        let n: i64 = digits
            .parse()
            .with_context(|| format!("Invalid number in duration: {}", digits))?;
        digits.clear();

        let part = match c {
            'd' => Duration::try_days(n),
            'h' => Duration::try_hours(n),
            'm' => Duration::try_minutes(n),
            's' => Duration::try_seconds(n),
            _ => return Err(anyhow!("Unknown duration unit: '{}'. Use d, h, m, or s", c)),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| anyhow!("Duration '{}' is out of range", s))?;
    }

    if !digits.is_empty() {
        return Err(anyhow!(
            "Duration '{}' is missing a unit. Use d (days), h (hours), m (minutes), or s (seconds)",
            s
        ));
    }
    if total <= Duration::zero() {
        return Err(anyhow!("Duration must be greater than zero"));
    }

    Ok(total)
}

fn sweeper(dal: &DAL) -> MaintenanceSweeper {
    MaintenanceSweeper::new(dal.clone(), Arc::new(DatabaseLockStore::new(dal.clone())))
}

pub async fn idempotency(dal: &DAL, dry_run: bool) -> Result<()> {
    let now = Utc::now();

    if dry_run {
        let count = dal
            .idempotency()
            .count_expired(now)
            .await
            .context("Failed to count expired idempotency keys")?;
        info!("[DRY RUN] Would delete {} expired idempotency key(s)", count);
        return Ok(());
    }

    let purged = sweeper(dal)
        .purge_idempotency(now)
        .await
        .context("Failed to purge idempotency keys")?;
    info!("Deleted {} expired idempotency key(s)", purged);
    Ok(())
}

/// `now - retention`, or an error when that instant is not representable.
fn cutoff_before(now: DateTime<Utc>, retention: Duration) -> Result<DateTime<Utc>> {
    now.checked_sub_signed(retention).ok_or_else(|| {
        anyhow!(
            "Retention of {} reaches before the earliest supported date",
            retention
        )
    })
}

pub async fn registrations(dal: &DAL, older_than: &str, dry_run: bool) -> Result<()> {
    let retention = parse_duration(older_than)
        .with_context(|| format!("Invalid duration: '{}'", older_than))?;
    let cutoff = cutoff_before(Utc::now(), retention)?;

    info!(
        "Purging registrations withdrawn more than {} ago (cutoff: {})",
        older_than, cutoff
    );

    if dry_run {
        let count = dal
            .registration()
            .count_deleted_before(cutoff)
            .await
            .context("Failed to count withdrawn registrations")?;
        info!(
            "[DRY RUN] Would delete {} withdrawn registration(s) older than {}",
            count, cutoff
        );
        return Ok(());
    }

    let purged = sweeper(dal)
        .purge_registrations(cutoff)
        .await
        .context("Failed to purge registrations")?;
    if purged == 0 {
        info!("No withdrawn registrations found older than {}", cutoff);
    } else {
        info!("Deleted {} withdrawn registration(s) older than {}", purged, cutoff);
    }
    Ok(())
}

pub async fn locks(dal: &DAL) -> Result<()> {
    let purged = sweeper(dal)
        .purge_locks()
        .await
        .context("Failed to purge competition locks")?;
    info!("Deleted {} expired competition lock(s)", purged);
    Ok(())
}
