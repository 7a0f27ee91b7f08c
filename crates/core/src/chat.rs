// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat history and learned-memory row shapes.
//!
//! These rows are persisted by the external key/value + SQL layer
//! (out of scope); this crate only defines their shape so the
//! enricher and GC logic in `hub-engine` can be typed end-to-end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistoryRow {
    pub id: u64,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnedMemoryCategory {
    Rule,
    Preference,
    Correction,
    Workflow,
    Fact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnedMemoryRow {
    pub id: u64,
    pub user_id: String,
    pub category: LearnedMemoryCategory,
    pub content: String,
    pub source_message: String,
    /// Confidence in [0, 1].
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

/// A periodic digest of a user's recent turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummaryRow {
    pub id: u64,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
