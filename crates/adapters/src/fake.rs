// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake provider driver for deterministic testing of the router, fan-out,
//! council, and approval gate without spawning real processes.

use crate::driver::{ProviderDriver, StatusObserver};
use async_trait::async_trait;
use hub_core::{ProviderId, ProviderResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum FakeOutcome {
    Ok(String),
    Partial(String),
    Error(String),
    Timeout(String),
    /// Simulate a soft deadline being exceeded (sleeps past `deadline`
    /// before returning a timeout response), for tests that assert total
    /// elapsed time.
    Hang,
}

#[derive(Clone)]
pub struct FakeProviderDriver {
    provider: ProviderId,
    inner: Arc<Mutex<FakeState>>,
}

struct FakeState {
    queue: VecDeque<FakeOutcome>,
    prompts: Vec<String>,
}

impl FakeProviderDriver {
    pub fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            inner: Arc::new(Mutex::new(FakeState {
                queue: VecDeque::new(),
                prompts: Vec::new(),
            })),
        }
    }

    pub fn push(&self, outcome: FakeOutcome) {
        self.inner.lock().queue.push_back(outcome);
    }

    pub fn prompts_seen(&self) -> Vec<String> {
        self.inner.lock().prompts.clone()
    }
}

#[async_trait]
impl ProviderDriver for FakeProviderDriver {
    async fn invoke(
        &self,
        prompt: &str,
        deadline: Duration,
        _observer: Option<&StatusObserver>,
    ) -> ProviderResponse {
        self.inner.lock().prompts.push(prompt.to_string());
        let outcome = self
            .inner
            .lock()
            .queue
            .pop_front()
            .unwrap_or(FakeOutcome::Ok(String::new()));

        match outcome {
            FakeOutcome::Ok(text) => ProviderResponse::ok(self.provider, text, Duration::from_millis(1)),
            FakeOutcome::Partial(text) => {
                ProviderResponse::partial(self.provider, text, Duration::from_millis(1))
            }
            FakeOutcome::Error(msg) => {
                ProviderResponse::failed(self.provider, msg, Duration::from_millis(1))
            }
            FakeOutcome::Timeout(captured) => {
                ProviderResponse::timed_out(self.provider, captured, deadline)
            }
            FakeOutcome::Hang => {
                tokio::time::sleep(deadline).await;
                ProviderResponse::timed_out(self.provider, "", deadline)
            }
        }
    }
}
