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


//! Implementation of the `failed-jobs` commands. Read-only.

use anyhow::{anyhow, Context, Result};
use seatline::models::FailedJob;
use seatline::DAL;

const ERROR_COLUMN_WIDTH: usize = 60;

pub async fn list(dal: &DAL, page: i64, per_page: i64, json: bool) -> Result<()> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 500);
    let failed = dal.failed_job();

    let jobs = failed
        .list(per_page, (page - 1) * per_page)
        .await
        .context("Failed to list failed jobs")?;
    let total = failed.count().await.context("Failed to count failed jobs")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No failed jobs (total {}).", total);
        return Ok(());
    }

    println!(
        "{:>8}  {:>8}  {:<24}  {:>8}  {:<20}  ERROR",
        "ID", "JOB", "NAME", "ATTEMPTS", "FAILED AT"
    );
    for job in &jobs {
        println!(
            "{:>8}  {:>8}  {:<24}  {:>8}  {:<20}  {}",
            job.id,
            job.job_id,
            job.job_name,
            job.attempts,
            job.failed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            truncate(&job.error, ERROR_COLUMN_WIDTH)
        );
    }
    println!("Page {} ({} of {} total)", page, jobs.len(), total);
    Ok(())
}

pub async fn show(dal: &DAL, id: i64) -> Result<()> {
    let job = dal
        .failed_job()
        .get(id)
        .await
        .context("Failed to load failed job")?
        .ok_or_else(|| anyhow!("Failed job {} not found", id))?;
    print_detail(&job)
}

fn print_detail(job: &FailedJob) -> Result<()> {
    println!("Failed job {}", job.id);
    println!("  queue job id: {}", job.job_id);
    println!("  job:          {}", job.job_name);
    println!("  attempts:     {}", job.attempts);
    println!("  failed at:    {}", job.failed_at.to_rfc3339());
    println!("  error:        {}", job.error);

    // Malformed payloads are printed raw.
    match serde_json::from_str::<serde_json::Value>(&job.payload) {
        Ok(payload) => println!("  payload:\n{}", serde_json::to_string_pretty(&payload)?),
        Err(_) => println!("  payload:      {}", job.payload),
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    let first_line = text.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max {
        return first_line.to_string();
    }
    let mut truncated: String = first_line.chars().take(max.saturating_sub(3)).collect();
    truncated.push_str("...");
    truncated
}
