// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundles the external collaborators a deployment injects into [`crate::app::App`].
//!
//! Every trait here is defined in `hub_engine::ports`; none is implemented
//! in this crate. The chat transport, the relational store, and the
//! document service are all out of scope for this core — a real
//! deployment supplies its own adapters for them. Building one here would
//! mean inventing an unspecified wire protocol.

use hub_engine::ports::{ApprovalLog, ChatHistoryStore, ChatTransport, ContextStore, LearnedMemoryStore, MemoryDocument, SessionSummaryStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct ExternalPorts {
    pub transport: Arc<dyn ChatTransport>,
    pub chat_history: Arc<dyn ChatHistoryStore>,
    pub learned_memory: Arc<dyn LearnedMemoryStore>,
    pub session_summaries: Arc<dyn SessionSummaryStore>,
    pub context: Arc<dyn ContextStore>,
    pub approval_log: Arc<dyn ApprovalLog>,
    pub memory_document: Arc<dyn MemoryDocument>,
}
