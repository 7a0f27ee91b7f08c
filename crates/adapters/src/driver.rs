// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `ProviderDriver` trait: invoke one external back-end, return a typed
//! response.

use async_trait::async_trait;
use hub_core::ProviderResponse;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Streaming status callback invoked with raw stderr/progress lines while a
/// provider call is in flight. Rate-limiting ("≥4s between
/// transport edits") is the caller's responsibility; the observer itself
/// must never block the reader.
pub type StatusObserver = Box<dyn Fn(&str) + Send + Sync>;

#[async_trait]
pub trait ProviderDriver: Send + Sync + 'static {
    /// Invoke the back-end with `prompt`, honoring `deadline` as the soft
    /// timeout. `observer`, if present, receives raw
    /// status/progress lines as they arrive.
    async fn invoke(
        &self,
        prompt: &str,
        deadline: Duration,
        observer: Option<&StatusObserver>,
    ) -> ProviderResponse;
}

/// Trim surrounding whitespace from a captured provider response.
pub fn trim_output(raw: &str) -> String {
    raw.trim().to_string()
}
