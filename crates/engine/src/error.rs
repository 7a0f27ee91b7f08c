// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the orchestration engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("a nightshift run is already in progress")]
    NightshiftBusy,
    #[error("journal error: {0}")]
    Journal(#[from] hub_storage::JournalError),
}
