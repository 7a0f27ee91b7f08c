// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable work state journaled across restarts.

use crate::id::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
    Stopped,
}

impl TaskStatus {
    /// Checklist icon used when re-injecting context after a restart.
    pub fn icon(self) -> &'static str {
        match self {
            TaskStatus::Pending => "\u{2610}",     // ☐
            TaskStatus::InProgress => "\u{1F504}", // 🔄
            TaskStatus::Completed => "\u{2705}",   // ✅
            TaskStatus::Failed => "\u{274C}",      // ❌
            TaskStatus::Skipped => "\u{23ED}",     // ⏭
            TaskStatus::Stopped => "\u{23F9}",     // ⏹
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkTask {
    pub id: TaskId,
    pub description: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl WorkTask {
    pub fn new(id: TaskId, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            status: TaskStatus::Pending,
            notes: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkState {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub assigned_by: String,
    pub directive: String,
    pub user_id: String,
    pub chat_id: String,
    pub username: String,
    pub tasks: Vec<WorkTask>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub last_progress: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Default expiry window applied at plan creation (48h).
pub const DEFAULT_EXPIRY: chrono::Duration = chrono::Duration::hours(48);

impl WorkState {
    pub fn has_open_work(&self) -> bool {
        self.tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::Pending | TaskStatus::InProgress))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn task_mut(&mut self, id: TaskId) -> Option<&mut WorkTask> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }
}
