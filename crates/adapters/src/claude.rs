// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude back-end driver (provider A): subprocess CLI, stdin delivery.

use crate::cli_driver;
use crate::driver::{ProviderDriver, StatusObserver};
use crate::env;
use async_trait::async_trait;
use hub_core::{ProviderId, ProviderResponse};
use std::time::Duration;

#[derive(Clone)]
pub struct ClaudeDriver {
    command: String,
}

impl ClaudeDriver {
    pub fn new() -> Self {
        Self {
            command: env::claude_path(),
        }
    }

    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for ClaudeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderDriver for ClaudeDriver {
    async fn invoke(
        &self,
        prompt: &str,
        deadline: Duration,
        observer: Option<&StatusObserver>,
    ) -> ProviderResponse {
        cli_driver::invoke(ProviderId::Claude, &self.command, prompt, deadline, observer).await
    }
}
