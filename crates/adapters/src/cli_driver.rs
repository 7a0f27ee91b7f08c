// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared stdin-redirected subprocess invocation used by the Claude and
//! Gemini drivers (back-ends A and B share "write prompt to a
//! temporary file; execute the configured command with that path
//! redirected to standard input").

use crate::driver::{trim_output, StatusObserver};
use crate::subprocess::{run_with_escalating_kill, StdinSource};
use crate::env;
use hub_core::{ProviderId, ProviderResponse};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Split a configured command string into a program and its arguments.
fn split_command(command: &str) -> (&str, Vec<&str>) {
    let mut parts = command.split_whitespace();
    let program = parts.next().unwrap_or("");
    (program, parts.collect())
}

/// Invoke a stdin-redirected CLI provider with `prompt`, honoring
/// `deadline`, and forward captured stderr lines to `observer`.
pub async fn invoke(
    provider: ProviderId,
    command: &str,
    prompt: &str,
    deadline: Duration,
    observer: Option<&StatusObserver>,
) -> ProviderResponse {
    let started = Instant::now();

    let tmp = match NamedTempFile::new() {
        Ok(f) => f,
        Err(e) => {
            return ProviderResponse::failed(
                provider,
                format!("spawn failed: {e}"),
                started.elapsed(),
            )
        }
    };
    if let Err(e) = std::fs::write(tmp.path(), prompt) {
        return ProviderResponse::failed(provider, format!("spawn failed: {e}"), started.elapsed());
    }

    let (program, args) = split_command(command);
    if program.is_empty() {
        return ProviderResponse::failed(
            provider,
            "spawn failed: empty command",
            started.elapsed(),
        );
    }

    let mut cmd = tokio::process::Command::new(program);
    cmd.args(&args);
    cmd.envs(env::build_provider_env());

    let result = run_with_escalating_kill(cmd, deadline, StdinSource::File(tmp.path())).await;
    // NamedTempFile is removed here on drop regardless of how `result`
    // turned out — cleanup happens on every exit path.
    drop(tmp);

    let latency = started.elapsed();

    let output = match result {
        Err(e) => {
            return ProviderResponse::failed(provider, format!("spawn failed: {e}"), latency);
        }
        Ok(output) => output,
    };

    if let Some(observer) = observer {
        for line in output.stderr.lines() {
            observer(line);
        }
    }

    if output.timed_out {
        return ProviderResponse::timed_out(provider, trim_output(&output.stdout), latency);
    }

    match output.exit_code {
        Some(0) => ProviderResponse::ok(provider, trim_output(&output.stdout), latency),
        Some(code) => {
            let trimmed = trim_output(&output.stdout);
            if trimmed.is_empty() {
                ProviderResponse::failed(provider, format!("exit {code}"), latency)
            } else {
                // Tolerant path: non-zero exit but some output survived.
                ProviderResponse::partial(provider, trimmed, latency)
            }
        }
        None => ProviderResponse::failed(provider, "process terminated by signal", latency),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_separates_program_and_args() {
        let (program, args) = split_command("claude --print --no-color");
        assert_eq!(program, "claude");
        assert_eq!(args, vec!["--print", "--no-color"]);
    }

    #[tokio::test]
    async fn ok_exit_trims_whitespace_from_output() {
        let response = invoke(
            ProviderId::Claude,
            "sh -c cat",
            "  hello there  ",
            Duration::from_secs(5),
            None,
        )
        .await;
        assert_eq!(response.output, "hello there");
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn nonzero_exit_with_empty_output_is_an_error() {
        let response = invoke(
            ProviderId::Gemini,
            "false",
            "ignored",
            Duration::from_secs(5),
            None,
        )
        .await;
        assert!(response.is_error());
        assert_eq!(response.error.as_deref(), Some("exit 1"));
    }

    #[tokio::test]
    async fn missing_executable_reports_spawn_failed() {
        let response = invoke(
            ProviderId::Claude,
            "definitely-not-a-real-binary-xyz",
            "hi",
            Duration::from_secs(5),
            None,
        )
        .await;
        assert!(response.is_error());
        assert!(response.error.as_deref().unwrap_or_default().starts_with("spawn failed"));
    }
}
