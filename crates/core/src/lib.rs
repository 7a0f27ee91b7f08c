// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hub-core: shared domain types for the AI orchestration hub.

pub mod approval;
pub mod chat;
pub mod clock;
pub mod council;
pub mod id;
pub mod provider;
pub mod route;
pub mod work;

pub use approval::{ApprovalFlags, ApprovalPacket, ApprovalRecord, TestResult};
pub use chat::{ChatHistoryRow, ChatRole, LearnedMemoryCategory, LearnedMemoryRow, SessionSummaryRow};
pub use clock::{Clock, FakeClock, SystemClock};
pub use council::{CouncilRecord, CouncilRound};
pub use id::{ApprovalId, CouncilId, TaskId, WorkId};
pub use provider::{InputMode, ProviderId, ProviderResponse};
pub use route::{RouteKind, RouteResult};
pub use work::{TaskStatus, WorkState, WorkTask};
