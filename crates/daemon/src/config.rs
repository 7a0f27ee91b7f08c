// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-driven daemon configuration.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("HUB_TRANSPORT_TOKEN is not set")]
    MissingTransportToken,
    #[error("HUB_ALLOWED_USERS is not set")]
    MissingAllowedUsers,
}

/// Configuration loaded once at startup. Fatal on a missing required
/// variable (exit code 1 on "missing token, missing allowed
/// users").
#[derive(Debug, Clone)]
pub struct Config {
    /// Identifies the chat-transport identity this daemon answers as.
    pub transport_token: String,
    /// Authorized user identities.
    pub allowed_users: Vec<String>,
    /// Base URL for the key/value + SQL gateway, if a memory service is
    /// configured for this deployment.
    pub memory_service_url: Option<String>,
    /// Bearer credential for the memory service.
    pub memory_service_api_key: Option<String>,
    /// Identifies the shared long-form memory document.
    pub memory_doc_id: String,
    /// Optional device-agent notification endpoint.
    pub agent_notify_url: Option<String>,
    pub agent_notify_token: Option<String>,
    /// Work-state journal path (`<project>/.work-state.json`).
    pub work_state_path: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let transport_token = std::env::var("HUB_TRANSPORT_TOKEN").map_err(|_| ConfigError::MissingTransportToken)?;

        let allowed_users: Vec<String> = std::env::var("HUB_ALLOWED_USERS")
            .map_err(|_| ConfigError::MissingAllowedUsers)?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if allowed_users.is_empty() {
            return Err(ConfigError::MissingAllowedUsers);
        }

        Ok(Self {
            transport_token,
            allowed_users,
            memory_service_url: std::env::var("HUB_MEMORY_SERVICE_URL").ok(),
            memory_service_api_key: std::env::var("HUB_MEMORY_SERVICE_API_KEY").ok(),
            memory_doc_id: std::env::var("HUB_MEMORY_DOC_ID").unwrap_or_else(|_| "memory".to_string()),
            agent_notify_url: std::env::var("HUB_AGENT_NOTIFY_URL").ok(),
            agent_notify_token: std::env::var("HUB_AGENT_NOTIFY_TOKEN").ok(),
            work_state_path: hub_storage::journal::default_path(),
        })
    }

    pub fn is_allowed(&self, user_id: &str) -> bool {
        self.allowed_users.iter().any(|u| u == user_id)
    }
}
