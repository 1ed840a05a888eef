/*
 *  Copyright 2025-2026 Colliery Software
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

//! Implementation of the `admin cleanup-events` command.
//!
//! Request events are an audit trail and grow without bound; this removes
//! the ones older than a retention period. Requests themselves are kept.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use holdfast::dal::DAL;
use holdfast_server::ConfigOverrides;
use std::path::Path;
use tracing::info;

/// Parses a retention period such as "90d", "24h" or "1d6h30m".
///
/// Units are `d`, `h`, `m` and `s`; every number needs a unit.
fn parse_duration(input: &str) -> Result<Duration> {
    let input = input.trim().to_ascii_lowercase();
    if input.is_empty() {
        bail!("Duration cannot be empty");
    }

    let mut total = Duration::zero();
    let mut rest = input.as_str();
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            bail!("Expected a number at '{}'", rest);
        }
        let (number, tail) = rest.split_at(digits);
        let mut chars = tail.chars();
        let unit = chars
            .next()
            .ok_or_else(|| anyhow!("'{}' is missing a unit (d, h, m or s)", input))?;
        let value: i64 = number
            .parse()
            .with_context(|| format!("Invalid number '{}'", number))?;

        let part = match unit {
            'd' => Duration::try_days(value),
            'h' => Duration::try_hours(value),
            'm' => Duration::try_minutes(value),
            's' => Duration::try_seconds(value),
            other => bail!("Unknown unit '{}', expected d, h, m or s", other),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| anyhow!("'{}' is too long", input))?;
        rest = chars.as_str();
    }

    if total <= Duration::zero() {
        bail!("Duration must be greater than zero");
    }
    Ok(total)
}

pub async fn run(
    config: Option<&Path>,
    overrides: &ConfigOverrides,
    older_than: &str,
    dry_run: bool,
) -> Result<()> {
    let retention = parse_duration(older_than)
        .with_context(|| format!("Invalid duration: '{}'", older_than))?;
    let cutoff = Utc::now()
        .checked_sub_signed(retention)
        .ok_or_else(|| anyhow!("Duration '{}' reaches before the earliest timestamp", older_than))?;

    let database_url = super::database_url(config, overrides)?;
    let dal = DAL::new(super::connect(&database_url)?);
    let events = dal.request_event();

    if dry_run {
        let count = events
            .count_older_than(cutoff)
            .await
            .context("Failed to count events")?;
        info!(count, %cutoff, "[DRY RUN] Request events that would be deleted");
    } else {
        let deleted = events
            .delete_older_than(cutoff)
            .await
            .context("Failed to delete events")?;
        info!(deleted, %cutoff, "Deleted request events");
    }

    Ok(())
}
