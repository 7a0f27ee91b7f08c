// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow trait interfaces to the collaborators that live outside this
//! core: the chat transport, the chat-history/learned-memory relational
//! store, the approval audit log, and the long-form memory document
//! service. Only the interfaces are this core's concern; the SQL gateway,
//! the transport client, and the document service itself are out of
//! scope.

use async_trait::async_trait;
use hub_core::{ApprovalRecord, ChatHistoryRow, ChatRole, LearnedMemoryCategory, LearnedMemoryRow, SessionSummaryRow};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("transport rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("transport refused the action")]
    PermissionDenied,
    #[error("{0}")]
    Other(String),
}

/// Delivers replies and edits status messages in the chat transport.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_reply(&self, chat_id: &str, text: &str) -> Result<(), PortError>;
    async fn edit_status(&self, chat_id: &str, message_id: &str, text: &str) -> Result<(), PortError>;
}

/// The chat-history slice of the relational store.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn append(&self, user_id: &str, role: ChatRole, content: &str) -> Result<(), PortError>;
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ChatHistoryRow>, PortError>;
    async fn purge_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, PortError>;
}

/// The learned-memory slice of the relational store.
#[async_trait]
pub trait LearnedMemoryStore: Send + Sync {
    async fn insert(
        &self,
        user_id: &str,
        category: LearnedMemoryCategory,
        content: &str,
        source_message: &str,
        confidence: f32,
    ) -> Result<(), PortError>;
    async fn active_for(&self, user_id: &str) -> Result<Vec<LearnedMemoryRow>, PortError>;
    async fn deactivate(&self, ids: &[u64]) -> Result<(), PortError>;
    async fn delete(&self, ids: &[u64]) -> Result<(), PortError>;
}

/// The session-summary slice of the relational store.
#[async_trait]
pub trait SessionSummaryStore: Send + Sync {
    async fn insert(&self, user_id: &str, content: &str) -> Result<(), PortError>;
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<SessionSummaryRow>, PortError>;
    /// Deletes rows older than `cutoff`, then deletes all but the 5
    /// most-recent remaining rows per user.
    async fn gc(&self, cutoff: chrono::DateTime<chrono::Utc>, keep_per_user: usize) -> Result<u64, PortError>;
}

/// The per-user context row merged by the post-process pipeline.
/// Distinct from `MemoryDocument`, which is the shared long-form document
/// rather than a per-user row.
#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn merge(&self, user_id: &str, text: &str) -> Result<(), PortError>;
}

/// The approval audit log ("written exactly once per decision").
#[async_trait]
pub trait ApprovalLog: Send + Sync {
    async fn record(&self, record: &ApprovalRecord) -> Result<(), PortError>;
}

/// The external long-form shared-memory document.
#[async_trait]
pub trait MemoryDocument: Send + Sync {
    async fn get(&self, doc_id: &str) -> Result<String, PortError>;
    async fn batch_update(&self, doc_id: &str, insert_at: usize, text: &str) -> Result<(), PortError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! In-memory test doubles for every port, used by the router,
    //! nightshift, and post-process pipeline tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeChatTransport {
        pub sent: Mutex<Vec<(String, String)>>,
        pub edits: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl ChatTransport for FakeChatTransport {
        async fn send_reply(&self, chat_id: &str, text: &str) -> Result<(), PortError> {
            self.sent.lock().push((chat_id.to_string(), text.to_string()));
            Ok(())
        }

        async fn edit_status(&self, chat_id: &str, message_id: &str, text: &str) -> Result<(), PortError> {
            self.edits
                .lock()
                .push((chat_id.to_string(), message_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeChatHistoryStore {
        rows: Mutex<Vec<ChatHistoryRow>>,
        next_id: Mutex<u64>,
    }

    #[async_trait]
    impl ChatHistoryStore for FakeChatHistoryStore {
        async fn append(&self, user_id: &str, role: ChatRole, content: &str) -> Result<(), PortError> {
            let mut next_id = self.next_id.lock();
            *next_id += 1;
            self.rows.lock().push(ChatHistoryRow {
                id: *next_id,
                user_id: user_id.to_string(),
                timestamp: chrono::Utc::now(),
                role,
                content: content.to_string(),
            });
            Ok(())
        }

        async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ChatHistoryRow>, PortError> {
            let mut rows: Vec<_> = self
                .rows
                .lock()
                .iter()
                .filter(|r| r.user_id == user_id)
                .cloned()
                .collect();
            rows.sort_by_key(|r| r.id);
            if rows.len() > limit {
                rows = rows.split_off(rows.len() - limit);
            }
            Ok(rows)
        }

        async fn purge_older_than(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64, PortError> {
            let mut rows = self.rows.lock();
            let before = rows.len();
            rows.retain(|r| r.timestamp >= cutoff);
            Ok((before - rows.len()) as u64)
        }
    }

    #[derive(Default)]
    pub struct FakeLearnedMemoryStore {
        rows: Mutex<HashMap<u64, LearnedMemoryRow>>,
        next_id: Mutex<u64>,
    }

    impl FakeLearnedMemoryStore {
        pub fn seed(&self, row: LearnedMemoryRow) {
            let id = row.id;
            self.rows.lock().insert(id, row);
            let mut next_id = self.next_id.lock();
            *next_id = (*next_id).max(id + 1);
        }

        pub fn all(&self) -> Vec<LearnedMemoryRow> {
            let mut rows: Vec<_> = self.rows.lock().values().cloned().collect();
            rows.sort_by_key(|r| r.id);
            rows
        }
    }

    #[async_trait]
    impl LearnedMemoryStore for FakeLearnedMemoryStore {
        async fn insert(
            &self,
            user_id: &str,
            category: LearnedMemoryCategory,
            content: &str,
            source_message: &str,
            confidence: f32,
        ) -> Result<(), PortError> {
            let mut next_id = self.next_id.lock();
            *next_id += 1;
            self.rows.lock().insert(
                *next_id,
                LearnedMemoryRow {
                    id: *next_id,
                    user_id: user_id.to_string(),
                    category,
                    content: content.to_string(),
                    source_message: source_message.to_string(),
                    confidence,
                    created_at: chrono::Utc::now(),
                    active: true,
                },
            );
            Ok(())
        }

        async fn active_for(&self, user_id: &str) -> Result<Vec<LearnedMemoryRow>, PortError> {
            Ok(self
                .rows
                .lock()
                .values()
                .filter(|r| r.user_id == user_id && r.active)
                .cloned()
                .collect())
        }

        async fn deactivate(&self, ids: &[u64]) -> Result<(), PortError> {
            let mut rows = self.rows.lock();
            for id in ids {
                if let Some(row) = rows.get_mut(id) {
                    row.active = false;
                }
            }
            Ok(())
        }

        async fn delete(&self, ids: &[u64]) -> Result<(), PortError> {
            let mut rows = self.rows.lock();
            for id in ids {
                rows.remove(id);
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeSessionSummaryStore {
        rows: Mutex<Vec<SessionSummaryRow>>,
        next_id: Mutex<u64>,
    }

    impl FakeSessionSummaryStore {
        pub fn all(&self) -> Vec<SessionSummaryRow> {
            let mut rows: Vec<_> = self.rows.lock().clone();
            rows.sort_by_key(|r| r.id);
            rows
        }
    }

    #[async_trait]
    impl SessionSummaryStore for FakeSessionSummaryStore {
        async fn insert(&self, user_id: &str, content: &str) -> Result<(), PortError> {
            let mut next_id = self.next_id.lock();
            *next_id += 1;
            self.rows.lock().push(SessionSummaryRow {
                id: *next_id,
                user_id: user_id.to_string(),
                content: content.to_string(),
                created_at: chrono::Utc::now(),
            });
            Ok(())
        }

        async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<SessionSummaryRow>, PortError> {
            let mut rows: Vec<_> = self.rows.lock().iter().filter(|r| r.user_id == user_id).cloned().collect();
            rows.sort_by_key(|r| r.id);
            if rows.len() > limit {
                rows = rows.split_off(rows.len() - limit);
            }
            Ok(rows)
        }

        async fn gc(&self, cutoff: chrono::DateTime<chrono::Utc>, keep_per_user: usize) -> Result<u64, PortError> {
            let mut rows = self.rows.lock();
            let before = rows.len();
            rows.retain(|r| r.created_at >= cutoff);

            let mut per_user: HashMap<String, Vec<u64>> = HashMap::new();
            for row in rows.iter() {
                per_user.entry(row.user_id.clone()).or_default().push(row.id);
            }
            let mut keep_ids: std::collections::HashSet<u64> = std::collections::HashSet::new();
            for mut ids in per_user.into_values() {
                ids.sort_unstable();
                let keep_from = ids.len().saturating_sub(keep_per_user);
                keep_ids.extend(&ids[keep_from..]);
            }
            rows.retain(|r| keep_ids.contains(&r.id));

            Ok((before - rows.len()) as u64)
        }
    }

    #[derive(Default)]
    pub struct FakeContextStore {
        pub rows: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl ContextStore for FakeContextStore {
        async fn merge(&self, user_id: &str, text: &str) -> Result<(), PortError> {
            let mut rows = self.rows.lock();
            let entry = rows.entry(user_id.to_string()).or_default();
            if !entry.is_empty() {
                entry.push('\n');
            }
            entry.push_str(text);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeApprovalLog {
        pub records: Mutex<Vec<ApprovalRecord>>,
    }

    #[async_trait]
    impl ApprovalLog for FakeApprovalLog {
        async fn record(&self, record: &ApprovalRecord) -> Result<(), PortError> {
            self.records.lock().push(record.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeMemoryDocument {
        pub text: Mutex<String>,
        pub fail: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl MemoryDocument for FakeMemoryDocument {
        async fn get(&self, _doc_id: &str) -> Result<String, PortError> {
            if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(PortError::Other("document service unavailable".into()));
            }
            Ok(self.text.lock().clone())
        }

        async fn batch_update(&self, _doc_id: &str, insert_at: usize, text: &str) -> Result<(), PortError> {
            let mut current = self.text.lock();
            let at = insert_at.min(current.len());
            current.insert_str(at, text);
            Ok(())
        }
    }
}
