// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retention sweep over learned memory and chat history.

use crate::ports::{ChatHistoryStore, LearnedMemoryStore, SessionSummaryStore};
use hub_core::LearnedMemoryRow;

/// Rows inactive for more than 90 days are candidates for deactivation
/// once their confidence has dropped below 0.8; rows that have stayed
/// inactive past 180 days are candidates for physical deletion. Neither
/// row shape carries a separate "deactivated at" timestamp, so both
/// windows are measured from `created_at` — a row can only become
/// inactive by aging past the 90-day mark in the first place, so the
/// two cutoffs never disagree about ordering.
const DEACTIVATE_AGE_DAYS: i64 = 90;
const DEACTIVATE_CONFIDENCE_CEILING: f32 = 0.8;
const DELETE_AGE_DAYS: i64 = 180;
const MAX_ACTIVE_PER_USER: usize = 50;
const CHAT_HISTORY_RETENTION_DAYS: i64 = 30;
const SESSION_SUMMARY_RETENTION_DAYS: i64 = 30;
const SESSION_SUMMARY_KEEP_PER_USER: usize = 5;

#[derive(Debug, Default, Clone, Copy)]
pub struct GcReport {
    pub deactivated: u64,
    pub deleted: u64,
    pub chat_rows_purged: u64,
    pub session_summaries_purged: u64,
}

/// Run the full learned-memory, session-summary, and chat-history sweep
/// for every user that currently has active rows. Idempotent:
/// re-running immediately afterward deactivates/deletes nothing further.
pub async fn run(
    memory: &dyn LearnedMemoryStore,
    history: &dyn ChatHistoryStore,
    summaries: &dyn SessionSummaryStore,
    all_user_ids: &[String],
    now: chrono::DateTime<chrono::Utc>,
) -> GcReport {
    let mut report = GcReport::default();

    for user_id in all_user_ids {
        let Ok(active) = memory.active_for(user_id).await else {
            continue;
        };

        let (stale, mut fresh): (Vec<_>, Vec<_>) = active.into_iter().partition(|row| is_stale(row, now));

        let mut to_deactivate: Vec<u64> = stale.iter().map(|row| row.id).collect();

        if fresh.len() > MAX_ACTIVE_PER_USER {
            fresh.sort_by(|a, b| {
                a.confidence
                    .partial_cmp(&b.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.created_at.cmp(&b.created_at))
            });
            let overflow = fresh.len() - MAX_ACTIVE_PER_USER;
            to_deactivate.extend(fresh.iter().take(overflow).map(|row| row.id));
        }

        if !to_deactivate.is_empty() {
            if memory.deactivate(&to_deactivate).await.is_ok() {
                report.deactivated += to_deactivate.len() as u64;
            }
        }

        let to_delete: Vec<u64> = stale
            .iter()
            .filter(|row| is_deletable(row, now))
            .map(|row| row.id)
            .collect();
        if !to_delete.is_empty() && memory.delete(&to_delete).await.is_ok() {
            report.deleted += to_delete.len() as u64;
        }
    }

    let cutoff = now - chrono::Duration::days(CHAT_HISTORY_RETENTION_DAYS);
    if let Ok(purged) = history.purge_older_than(cutoff).await {
        report.chat_rows_purged = purged;
    }

    let summary_cutoff = now - chrono::Duration::days(SESSION_SUMMARY_RETENTION_DAYS);
    if let Ok(purged) = summaries.gc(summary_cutoff, SESSION_SUMMARY_KEEP_PER_USER).await {
        report.session_summaries_purged = purged;
    }

    report
}

fn is_stale(row: &LearnedMemoryRow, now: chrono::DateTime<chrono::Utc>) -> bool {
    let age = now - row.created_at;
    age > chrono::Duration::days(DEACTIVATE_AGE_DAYS) && row.confidence < DEACTIVATE_CONFIDENCE_CEILING
}

fn is_deletable(row: &LearnedMemoryRow, now: chrono::DateTime<chrono::Utc>) -> bool {
    let age = now - row.created_at;
    age > chrono::Duration::days(DELETE_AGE_DAYS)
}
