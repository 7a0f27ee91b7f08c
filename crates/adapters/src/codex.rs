// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Codex back-end driver (provider C): an in-process client library call
//! rather than a subprocess ("call an in-process client library
//! ... passing the prompt as a single concatenated string; response is
//! returned synchronously").

use crate::driver::{trim_output, ProviderDriver, StatusObserver};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use hub_core::{ProviderId, ProviderResponse};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct CodexDriver {
    client: Client<OpenAIConfig>,
    model: String,
}

impl CodexDriver {
    pub fn new(api_key: Option<String>) -> Self {
        let config = match api_key {
            Some(key) => OpenAIConfig::new().with_api_key(key),
            None => OpenAIConfig::new(),
        };
        Self {
            client: Client::with_config(config),
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[async_trait]
impl ProviderDriver for CodexDriver {
    async fn invoke(
        &self,
        prompt: &str,
        deadline: Duration,
        observer: Option<&StatusObserver>,
    ) -> ProviderResponse {
        let started = Instant::now();

        let message = match ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
        {
            Ok(m) => m,
            Err(e) => return ProviderResponse::failed(ProviderId::Codex, e.to_string(), started.elapsed()),
        };

        let request = match CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .build()
        {
            Ok(r) => r,
            Err(e) => return ProviderResponse::failed(ProviderId::Codex, e.to_string(), started.elapsed()),
        };

        if let Some(observer) = observer {
            observer("codex: dispatching request");
        }

        let chat = self.client.chat();
        let call = chat.create(request);
        match tokio::time::timeout(deadline, call).await {
            Ok(Ok(completion)) => {
                let latency = started.elapsed();
                let text = completion
                    .choices
                    .first()
                    .and_then(|choice| choice.message.content.clone())
                    .unwrap_or_default();
                ProviderResponse::ok(ProviderId::Codex, trim_output(&text), latency)
            }
            Ok(Err(e)) => ProviderResponse::failed(ProviderId::Codex, e.to_string(), started.elapsed()),
            Err(_elapsed) => ProviderResponse::timed_out(ProviderId::Codex, "", started.elapsed()),
        }
    }
}
