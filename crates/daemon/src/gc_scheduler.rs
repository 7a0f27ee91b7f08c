// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs the retention sweep once at startup and then on a fixed interval
//! (stale learned memory, chat history, and session summaries
//! are reaped once a day).

use crate::app::App;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Spawns the background sweep loop. The returned handle is aborted on
/// drop, so the caller should hold onto it for the daemon's lifetime.
pub fn spawn(app: Arc<App>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let report = app.run_gc().await;
            tracing::info!(
                deactivated = report.deactivated,
                deleted = report.deleted,
                chat_rows_purged = report.chat_rows_purged,
                session_summaries_purged = report.session_summaries_purged,
                "retention sweep complete"
            );
            tokio::time::sleep(SWEEP_INTERVAL).await;
        }
    })
}
