// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider identity and the shape of a single provider call's outcome.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a provider's invocation recipe delivers the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Prompt is written to a temp file, then the file is redirected to the
    /// child process's stdin.
    Stdin,
    /// Prompt is passed as a single concatenated string to an in-process
    /// client library call.
    InProcess,
}

/// One of the three configured back-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Subprocess CLI, stdin delivery.
    Claude,
    /// Subprocess CLI, stdin delivery.
    Gemini,
    /// In-process client library call.
    Codex,
}

impl ProviderId {
    pub const ALL: [ProviderId; 3] = [ProviderId::Claude, ProviderId::Gemini, ProviderId::Codex];

    /// Display name surfaced in fan-out/council section headers.
    pub fn display_name(self) -> &'static str {
        match self {
            ProviderId::Claude => "Claude",
            ProviderId::Gemini => "Gemini",
            ProviderId::Codex => "Codex",
        }
    }

    /// Emblem prefixed to section headers and status lines.
    pub fn emblem(self) -> &'static str {
        match self {
            ProviderId::Claude => "\u{1F7E0}", // orange circle
            ProviderId::Gemini => "\u{1F535}", // blue circle
            ProviderId::Codex => "\u{1F7E2}",  // green circle
        }
    }

    pub fn input_mode(self) -> InputMode {
        match self {
            ProviderId::Claude | ProviderId::Gemini => InputMode::Stdin,
            ProviderId::Codex => InputMode::InProcess,
        }
    }

    /// Default per-call deadline absent an override (180s for
    /// A/C, 120s for council rounds — council callers pass their own
    /// deadline explicitly).
    pub fn default_deadline(self) -> Duration {
        match self {
            ProviderId::Claude => Duration::from_secs(180),
            ProviderId::Gemini => Duration::from_secs(120),
            ProviderId::Codex => Duration::from_secs(180),
        }
    }

    /// The provider designated to run the approval gate classifier.
    pub fn approval_provider() -> ProviderId {
        ProviderId::Codex
    }

    /// The provider driven during nightshift task execution.
    pub fn nightshift_provider() -> ProviderId {
        ProviderId::Claude
    }

    /// The chairperson provider for council round 3 synthesis.
    pub fn council_synthesizer() -> ProviderId {
        ProviderId::Claude
    }

    /// The provider that summarizes a session's recent history.
    pub fn summarizer_provider() -> ProviderId {
        ProviderId::Gemini
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// The typed outcome of a single provider call.
///
/// Invariant: `error` and `output` are independently meaningful.
/// `output` may be non-empty even when `error` is populated (best-effort
/// partial output, e.g. from a tolerant non-zero exit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider: ProviderId,
    pub output: String,
    pub latency: Duration,
    pub error: Option<String>,
}

impl ProviderResponse {
    pub fn ok(provider: ProviderId, output: impl Into<String>, latency: Duration) -> Self {
        Self {
            provider,
            output: output.into(),
            latency,
            error: None,
        }
    }

    pub fn failed(provider: ProviderId, error: impl Into<String>, latency: Duration) -> Self {
        Self {
            provider,
            output: String::new(),
            latency,
            error: Some(error.into()),
        }
    }

    /// Tolerant failure: the process exited non-zero but still produced
    /// output worth keeping.
    pub fn partial(provider: ProviderId, output: impl Into<String>, latency: Duration) -> Self {
        Self {
            provider,
            output: output.into(),
            latency,
            error: None,
        }
    }

    pub fn timed_out(provider: ProviderId, captured: impl Into<String>, latency: Duration) -> Self {
        Self {
            provider,
            output: captured.into(),
            latency,
            error: Some("timeout".to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_output_survives_alongside_success() {
        let r = ProviderResponse::partial(ProviderId::Gemini, "partial text", Duration::from_secs(1));
        assert!(!r.is_error());
        assert_eq!(r.output, "partial text");
    }

    #[test]
    fn timeout_preserves_captured_output() {
        let r = ProviderResponse::timed_out(ProviderId::Claude, "so far...", Duration::from_secs(120));
        assert!(r.is_error());
        assert_eq!(r.output, "so far...");
        assert_eq!(r.error.as_deref(), Some("timeout"));
    }
}
