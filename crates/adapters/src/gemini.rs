// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gemini back-end driver (provider B): subprocess CLI, stdin delivery —
//! same invocation mechanism as Claude, distinct command.

use crate::cli_driver;
use crate::driver::{ProviderDriver, StatusObserver};
use crate::env;
use async_trait::async_trait;
use hub_core::{ProviderId, ProviderResponse};
use std::time::Duration;

#[derive(Clone)]
pub struct GeminiDriver {
    command: String,
}

impl GeminiDriver {
    pub fn new() -> Self {
        Self {
            command: env::gemini_path(),
        }
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for GeminiDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDriver for GeminiDriver {
    async fn invoke(
        &self,
        prompt: &str,
        deadline: Duration,
        observer: Option<&StatusObserver>,
    ) -> ProviderResponse {
        cli_driver::invoke(ProviderId::Gemini, &self.command, prompt, deadline, observer).await
    }
}
