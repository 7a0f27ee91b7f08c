// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget follow-up work after a primary reply: auto-review,
//! learned-memory extraction, session summarization, context merge.
//! Every job runs through `BackgroundRunner`, never as a
//! bare unawaited `tokio::spawn`.

use crate::ports::{ChatHistoryStore, ContextStore, LearnedMemoryStore, SessionSummaryStore};
use hub_adapters::ProviderDriver;
use hub_core::{ChatHistoryRow, LearnedMemoryCategory};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

const REVIEW_PREAMBLE: &str = "You are reviewing a proposed code change. Respond with \"LGTM\" if it \
is correct and complete, or a short list of concrete problems otherwise.";
const SECOND_OPINION_PREAMBLE: &str = "A first reviewer already commented on this diff. Give an \
independent second opinion, focused on anything they may have missed.";
const LARGE_DIFF_THRESHOLD: usize = 1000;
const REVIEW_DEADLINE: Duration = Duration::from_secs(60);
const SUMMARY_TURN_INTERVAL: u64 = 20;
const SUMMARY_ROW_WINDOW: usize = 50;
const SUMMARY_DEADLINE: Duration = Duration::from_secs(60);
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

#[allow(clippy::expect_used)]
fn code_change_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(edit file|write file|create file)\b|```\w+|[\w./-]+\.(rs|py|js|ts|go|java|c|cpp|rb|sh)\b")
            .expect("constant regex pattern is valid")
    })
}

/// Extract the portion of the reply worth sending to a reviewer, or
/// `None` if no code-change marker is present.
pub fn detect_code_change(reply: &str) -> Option<String> {
    if code_change_regex().is_match(reply) {
        Some(reply.to_string())
    } else {
        None
    }
}

/// Run the auto-review step: dispatch to the reviewer, suppress a clean
/// LGTM, and additionally ask for a second opinion on large diffs.
pub async fn auto_review(diff: &str, reviewer: &dyn ProviderDriver, second_opinion: &dyn ProviderDriver) -> Option<String> {
    let review_prompt = format!("{REVIEW_PREAMBLE}\n\n{diff}");
    let review = reviewer.invoke(&review_prompt, REVIEW_DEADLINE, None).await;
    if review.is_error() {
        return None;
    }

    let clean = review.output.trim();
    if clean.eq_ignore_ascii_case("lgtm") {
        return None;
    }

    let mut sections = vec![format!("Reviewer: {clean}")];

    if diff.chars().count() > LARGE_DIFF_THRESHOLD {
        let second_prompt = format!("{SECOND_OPINION_PREAMBLE}\n\n{diff}\n\nFirst reviewer said:\n{clean}");
        let second = second_opinion.invoke(&second_prompt, REVIEW_DEADLINE, None).await;
        if !second.is_error() && !second.output.trim().is_empty() {
            sections.push(format!("Second opinion: {}", second.output.trim()));
        }
    }

    Some(sections.join("\n\n"))
}

struct PatternFamily {
    category: LearnedMemoryCategory,
    regex: &'static str,
    confidence: f32,
}

fn pattern_families() -> &'static [PatternFamily] {
    &[
        PatternFamily {
            category: LearnedMemoryCategory::Rule,
            regex: r"(?i)\balways\b|\bnever\b|\bmust\b",
            confidence: 0.85,
        },
        PatternFamily {
            category: LearnedMemoryCategory::Preference,
            regex: r"(?i)\bi (?:prefer|like|want)\b",
            confidence: 0.7,
        },
        PatternFamily {
            category: LearnedMemoryCategory::Correction,
            regex: r"(?i)\bno,? (?:that's|that is) wrong\b|\bactually\b",
            confidence: 0.75,
        },
        PatternFamily {
            category: LearnedMemoryCategory::Workflow,
            regex: r"(?i)\bwhenever\b|\bevery time\b|\bfrom now on\b",
            confidence: 0.7,
        },
        PatternFamily {
            category: LearnedMemoryCategory::Fact,
            regex: r"(?i)\bmy (?:name|email|timezone|team) is\b",
            confidence: 0.9,
        },
    ]
}

#[allow(clippy::expect_used)]
fn family_regexes() -> &'static Vec<Regex> {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        pattern_families()
            .iter()
            .map(|f| Regex::new(f.regex).expect("constant regex pattern is valid"))
            .collect()
    })
}

pub struct ExtractedMemory {
    pub category: LearnedMemoryCategory,
    pub confidence: f32,
}

/// Match `message` against the known pattern families. A message may match more than one family.
pub fn extract_learned_memory(message: &str) -> Vec<ExtractedMemory> {
    pattern_families()
        .iter()
        .zip(family_regexes())
        .filter(|(_, re)| re.is_match(message))
        .map(|(family, _)| ExtractedMemory {
            category: family.category,
            confidence: family.confidence,
        })
        .collect()
}

pub async fn persist_learned_memory(
    store: &dyn LearnedMemoryStore,
    user_id: &str,
    message: &str,
) -> Result<usize, crate::ports::PortError> {
    let matches = extract_learned_memory(message);
    for m in &matches {
        store.insert(user_id, m.category, message, message, m.confidence).await?;
    }
    Ok(matches.len())
}

/// Every 20 assistant turns, summarize the last 50 rows and persist a
/// session summary.
pub fn should_summarize(assistant_turn_count: u64) -> bool {
    assistant_turn_count > 0 && assistant_turn_count % SUMMARY_TURN_INTERVAL == 0
}

fn format_rows_for_summary(rows: &[ChatHistoryRow]) -> String {
    rows.iter()
        .map(|r| format!("[{:?}] {}", r.role, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn run_session_summary(
    history: &dyn ChatHistoryStore,
    summaries: &dyn SessionSummaryStore,
    summarizer: &dyn ProviderDriver,
    user_id: &str,
) -> Result<(), crate::ports::PortError> {
    let rows = history.recent(user_id, SUMMARY_ROW_WINDOW).await?;
    if rows.is_empty() {
        return Ok(());
    }

    let prompt = format!(
        "Summarize the following conversation in a few sentences, focused on durable facts and decisions:\n\n{}",
        format_rows_for_summary(&rows)
    );
    let response = summarizer.invoke(&prompt, SUMMARY_DEADLINE, None).await;
    if response.is_error() {
        return Ok(());
    }

    summaries.insert(user_id, response.output.trim()).await
}

pub async fn merge_context(store: &dyn ContextStore, user_id: &str, text: &str) -> Result<(), crate::ports::PortError> {
    store.merge(user_id, text).await
}

/// A bounded-retry runner for fire-and-forget jobs. Every spawned job is
/// tracked in the internal `JoinSet` so nothing leaks as an unawaited
/// future; `drain` (typically called on a timer or at shutdown) awaits
/// and discards whatever has finished so far.
pub struct BackgroundRunner {
    tasks: tokio::task::JoinSet<()>,
}

impl Default for BackgroundRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundRunner {
    pub fn new() -> Self {
        Self {
            tasks: tokio::task::JoinSet::new(),
        }
    }

    /// Spawn `job`, retrying up to `MAX_RETRIES` times on `Err` with a
    /// fixed backoff between attempts. Failures after the retry budget is
    /// exhausted are logged, never propagated.
    pub fn spawn<F, Fut>(&mut self, name: &'static str, job: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<(), crate::ports::PortError>> + Send,
    {
        self.tasks.spawn(async move {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match job().await {
                    Ok(()) => return,
                    Err(error) if attempt < MAX_RETRIES => {
                        tracing::warn!(job = name, attempt, %error, "post-process job failed, retrying");
                        tokio::time::sleep(RETRY_BACKOFF).await;
                    }
                    Err(error) => {
                        tracing::warn!(job = name, attempt, %error, "post-process job exhausted retries");
                        return;
                    }
                }
            }
        });
    }

    /// Await every job spawned so far. Call this on a timer or at
    /// shutdown; never leaves spawned work permanently unjoined.
    pub async fn drain(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }

    pub fn pending(&self) -> usize {
        self.tasks.len()
    }
}
