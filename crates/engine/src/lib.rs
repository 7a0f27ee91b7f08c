// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hub-engine: the orchestration core — router, fan-out, council,
//! approval gate, nightshift executor, enrichment, GC, and post-process
//! pipeline built on the `hub-adapters` and `hub-storage` crates.

mod error;

pub mod approval;
pub mod council;
pub mod enrichment;
pub mod fanout;
pub mod gc;
pub mod nightshift;
pub mod postprocess;
pub mod ports;
pub mod recovery;
pub mod router;

pub use error::EngineError;
