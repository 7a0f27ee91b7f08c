// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assembles the system-prompt context block fed to a provider driver:
//! memory pack + recent history + optional context preamble.

use hub_adapters::{CircuitBreaker, CircuitBreakerConfig};
use hub_core::{ChatHistoryRow, ChatRole, ProviderId};
use std::sync::Arc;

use crate::ports::MemoryDocument;

const MEMORY_CHAR_LIMIT: usize = 5000;
const MEMORY_LINE_LIMIT: usize = 100;
const TRUNCATION_MARKER: &str = "\n...[truncated]...";
const RECENT_ROW_COUNT: usize = 15;
const RECENT_ROW_CHAR_LIMIT: usize = 2000;
const OLDER_ROW_CHAR_LIMIT: usize = 1000;
const TRUNCATION_SUFFIX: &str = "...";

/// Fetch the long-form memory document, falling back to a terse marker on
/// failure. Wrapped in the memory-service circuit breaker.
pub async fn fetch_memory_pack(
    doc: &dyn MemoryDocument,
    doc_id: &str,
    breaker: &Arc<CircuitBreaker>,
) -> String {
    const FALLBACK: &str = "[memory pack unavailable: document service did not respond]";
    let text = breaker
        .execute(
            || async move { doc.get(doc_id).await.map_err(|_| ()) },
            FALLBACK.to_string(),
        )
        .await;
    truncate_memory_pack(&text)
}

/// When larger than 5000 characters, replace the tail with an explicit
/// truncation marker after the first 100 lines. The two bounds (line
/// count, char count) are independent upper bounds; apply whichever is
/// tighter.
pub fn truncate_memory_pack(text: &str) -> String {
    if text.chars().count() <= MEMORY_CHAR_LIMIT {
        return text.to_string();
    }

    let by_lines: String = text
        .lines()
        .take(MEMORY_LINE_LIMIT)
        .collect::<Vec<_>>()
        .join("\n");

    let candidate = if by_lines.chars().count() <= MEMORY_CHAR_LIMIT {
        by_lines
    } else {
        text.chars().take(MEMORY_CHAR_LIMIT).collect()
    };

    format!("{candidate}{TRUNCATION_MARKER}")
}

/// Format recent chat history rows as `N. [role] content`, chronological
/// order, with per-row truncation (most-recent 15 rows get a
/// 2000-char budget, older rows get 1000).
pub fn format_history(rows: &[ChatHistoryRow]) -> String {
    let total = rows.len();
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let role = match row.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
            };
            let is_recent = total - i <= RECENT_ROW_COUNT;
            let limit = if is_recent { RECENT_ROW_CHAR_LIMIT } else { OLDER_ROW_CHAR_LIMIT };
            let content = truncate_with_suffix(&row.content, limit, TRUNCATION_SUFFIX);
            format!("{}. [{role}] {content}", i + 1)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_with_suffix(text: &str, limit: usize, suffix: &str) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let truncated: String = text.chars().take(limit).collect();
    format!("{truncated}{suffix}")
}

/// Compose the final prompt: `system block\n\nrole
/// preamble\n\nAI_MEMORY: <pack>\n\n<user prompt>`. The system context
/// block is only populated for provider B in this design, callers pass `None` for the other providers.
pub fn compose_prompt(
    provider: ProviderId,
    system_block: Option<&str>,
    role_preamble: &str,
    memory_pack: &str,
    history: &str,
    user_prompt: &str,
) -> String {
    let mut sections = Vec::new();
    if provider == ProviderId::Gemini {
        if let Some(block) = system_block {
            sections.push(block.to_string());
        }
    }
    sections.push(role_preamble.to_string());
    sections.push(format!("AI_MEMORY: {memory_pack}"));
    if !history.is_empty() {
        sections.push(history.to_string());
    }
    sections.push(user_prompt.to_string());
    sections.join("\n\n")
}

/// Deterministic ordering for the provider-B system context block: static
/// rules → project guide → current context → recent history.
pub fn build_system_block(static_rules: &str, project_guide: Option<&str>, current_context: Option<&str>) -> String {
    let mut parts = vec![static_rules.to_string()];
    if let Some(guide) = project_guide {
        parts.push(guide.to_string());
    }
    if let Some(context) = current_context {
        parts.push(context.to_string());
    }
    parts.join("\n\n")
}

pub fn memory_service_breaker() -> CircuitBreakerConfig {
    CircuitBreakerConfig::memory_service()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::fake::FakeMemoryDocument;
    use std::sync::atomic::Ordering;

    fn row(id: u64, role: ChatRole, content: &str) -> ChatHistoryRow {
        ChatHistoryRow {
            id,
            user_id: "u1".into(),
            timestamp: chrono::Utc::now(),
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn short_memory_pack_is_untouched() {
        assert_eq!(truncate_memory_pack("short"), "short");
    }

    #[test]
    fn long_memory_pack_is_truncated_with_marker() {
        let text = "x".repeat(6000);
        let truncated = truncate_memory_pack(&text);
        assert!(truncated.ends_with(TRUNCATION_MARKER));
        assert!(truncated.len() < text.len());
    }

    #[test]
    fn memory_pack_respects_the_tighter_of_line_and_char_bounds() {
        // 200 lines of 30 chars each: ~6000 chars total (over the char
        // limit), but the first 100 lines are only ~3000 chars (under the
        // char limit) — the line bound is the tighter one here.
        let text = (0..200)
            .map(|i| format!("{i:0>4} {}", "x".repeat(24)))
            .collect::<Vec<_>>()
            .join("\n");
        assert!(text.chars().count() > MEMORY_CHAR_LIMIT);

        let truncated = truncate_memory_pack(&text);
        let line_count = truncated.trim_end_matches(TRUNCATION_MARKER).lines().count();
        assert_eq!(line_count, MEMORY_LINE_LIMIT);
    }

    #[test]
    fn history_formats_with_ordinal_and_role() {
        let rows = vec![row(1, ChatRole::User, "hi"), row(2, ChatRole::Assistant, "hello")];
        let formatted = format_history(&rows);
        assert_eq!(formatted, "1. [user] hi\n2. [assistant] hello");
    }

    #[test]
    fn older_rows_truncate_tighter_than_recent_rows() {
        let mut rows: Vec<ChatHistoryRow> = (0..20)
            .map(|i| row(i, ChatRole::User, &"z".repeat(1500)))
            .collect();
        rows.push(row(20, ChatRole::User, &"z".repeat(1500)));
        let formatted = format_history(&rows);
        let lines: Vec<&str> = formatted.lines().collect();
        // row 0 is far from the tail: limited to 1000 + suffix.
        assert!(lines[0].ends_with("...") && lines[0].len() < 1100);
        // the last row is within the most-recent 15: allowed up to 2000 chars, no suffix needed here.
        assert!(!lines.last().unwrap().ends_with("..."));
    }

    #[tokio::test]
    async fn memory_fetch_falls_back_on_breaker_open() {
        let doc = FakeMemoryDocument::default();
        doc.fail.store(true, Ordering::SeqCst);
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: std::time::Duration::from_secs(60),
        }));

        let pack = fetch_memory_pack(&doc, "doc-1", &breaker).await;
        assert!(pack.contains("unavailable"));
    }
}
