// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

use std::path::PathBuf;
use std::time::Duration;

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Full path to the Claude CLI executable.
pub fn claude_path() -> String {
    std::env::var("HUB_CLAUDE_PATH").unwrap_or_else(|_| "claude".to_string())
}

/// Full path to the Gemini CLI executable.
pub fn gemini_path() -> String {
    std::env::var("HUB_GEMINI_PATH").unwrap_or_else(|_| "gemini".to_string())
}

/// API key for the in-process Codex (OpenAI-compatible) client.
pub fn codex_api_key() -> Option<String> {
    std::env::var("HUB_CODEX_API_KEY").ok()
}

/// Override for a provider's soft deadline.
pub fn provider_deadline_ms(var: &str) -> Option<Duration> {
    parse_duration_ms(var)
}

/// Directories appended to PATH so provider CLIs resolve system and
/// package-manager binaries the same way an interactive shell would.
pub fn extra_path_dirs() -> Vec<PathBuf> {
    ["/usr/local/bin", "/opt/homebrew/bin", "/usr/bin", "/bin"]
        .iter()
        .map(PathBuf::from)
        .collect()
}

/// HTTP(S) proxy variable names cleared before spawning a provider process
/// so it bypasses corporate proxies.
pub const PROXY_VARS_TO_CLEAR: [&str; 4] = ["http_proxy", "HTTP_PROXY", "https_proxy", "HTTPS_PROXY"];

/// Build the environment for a provider subprocess: ambient env, PATH
/// extended with `extra_path_dirs`, proxy variables cleared.
pub fn build_provider_env() -> Vec<(String, String)> {
    let mut vars: Vec<(String, String)> = std::env::vars()
        .filter(|(k, _)| !PROXY_VARS_TO_CLEAR.contains(&k.as_str()))
        .collect();

    let existing_path = std::env::var("PATH").unwrap_or_default();
    let extra = extra_path_dirs();
    let joined = std::env::join_paths(
        extra
            .iter()
            .map(|p| p.as_os_str().to_owned())
            .chain(std::iter::once(std::ffi::OsString::from(existing_path))),
    )
    .unwrap_or_default();

    if let Some(entry) = vars.iter_mut().find(|(k, _)| k == "PATH") {
        entry.1 = joined.to_string_lossy().to_string();
    } else {
        vars.push(("PATH".to_string(), joined.to_string_lossy().to_string()));
    }

    vars
}
