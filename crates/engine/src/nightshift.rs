// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Autonomous task-list execution under safety gates.

use crate::approval;
use crate::ports::ApprovalLog;
use hub_adapters::ProviderDriver;
use hub_core::{ApprovalFlags, ApprovalPacket, Clock, TaskId, TaskStatus, TestResult, WorkState, WorkTask};
use hub_storage::{Journal, JournalWriter};
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

const TASK_DEADLINE: Duration = Duration::from_secs(15 * 60);
const TIME_LIMIT: chrono::Duration = chrono::Duration::hours(4);
const CONSECUTIVE_ERROR_LIMIT: u32 = 3;
const INTERLOCK_FAILURE_LIMIT: u32 = 2;
const SUMMARY_CHAR_LIMIT: usize = 200;

/// Tokens whose presence in a task description (case-insensitive) skips
/// that single task without dispatching it to a provider.
const BLOCKED_TOKENS: &[&str] = &[
    "git push",
    "force push",
    "push --force",
    "rm -rf",
    "drop table",
    "delete from",
    "npm publish",
    "deploy",
];

/// Single global run guard: at most one nightshift execution at a time.
/// `Arc`-shareable so the daemon can hold one instance.
#[derive(Default)]
pub struct NightshiftSingleton {
    running: AtomicBool,
}

pub struct NightshiftGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for NightshiftGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl NightshiftSingleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `Err(EngineError::NightshiftBusy)` if a run is already in
    /// progress — the caller should surface a "busy" message rather than
    /// queueing.
    pub fn try_acquire(&self) -> Result<NightshiftGuard<'_>, crate::EngineError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| NightshiftGuard { flag: &self.running })
            .map_err(|_| crate::EngineError::NightshiftBusy)
    }
}

/// Out-of-band cancellation for an in-flight run: a "stop" command sets
/// this, and the loop checks it before every dispatch. Shareable across the task
/// that holds the `NightshiftGuard` and the handler processing the
/// incoming stop request.
#[derive(Default)]
pub struct AbortToken(AtomicBool);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the current run stop at its next safety-gate check.
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[allow(clippy::expect_used)]
fn task_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:\d+[.)]\s+|[-•*]\s+)?(.+)$").expect("constant regex pattern is valid"))
}

/// Split the body at the first line break and parse each subsequent
/// non-blank line into a task, stripping any user-supplied numbering or
/// bullet. Ordinal IDs are assigned fresh starting at 1.
pub fn parse_task_list(body: &str) -> Vec<WorkTask> {
    let rest = body.splitn(2, '\n').nth(1).unwrap_or("");
    let mut id = TaskId::first();
    let mut tasks = Vec::new();
    for line in rest.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(caps) = task_line_regex().captures(trimmed) {
            if let Some(desc) = caps.get(1) {
                tasks.push(WorkTask::new(id, desc.as_str().trim()));
                id = id.next();
            }
        }
    }
    tasks
}

/// The first blocked token found in `description`, if any (case-insensitive).
pub fn blocked_token(description: &str) -> Option<&'static str> {
    let lower = description.to_ascii_lowercase();
    BLOCKED_TOKENS.iter().find(|token| lower.contains(*token)).copied()
}

fn truncate_summary(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= SUMMARY_CHAR_LIMIT {
        trimmed.to_string()
    } else {
        trimmed.chars().take(SUMMARY_CHAR_LIMIT).collect()
    }
}

/// Extract a short summary from a provider's final textual segment: the
/// final paragraph, capped at 200 characters.
fn summarize_output(output: &str) -> String {
    let last_paragraph = output.split("\n\n").last().unwrap_or(output);
    truncate_summary(last_paragraph)
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub id: TaskId,
    pub status: TaskStatus,
    pub duration: Duration,
    pub summary: String,
}

#[derive(Debug, Clone)]
pub enum StopReason {
    TimeLimit,
    Aborted,
    ConsecutiveErrors,
    ApprovalStop(String),
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub completed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub stopped: u32,
    pub tasks: Vec<TaskReport>,
    pub stop_reason: Option<StopReason>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            completed: 0,
            failed: 0,
            skipped: 0,
            stopped: 0,
            tasks: Vec::new(),
            stop_reason: None,
        }
    }

    fn push(&mut self, report: TaskReport) {
        match report.status {
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Failed => self.failed += 1,
            TaskStatus::Skipped => self.skipped += 1,
            TaskStatus::Stopped => self.stopped += 1,
            TaskStatus::Pending | TaskStatus::InProgress => {}
        }
        self.tasks.push(report);
    }
}

/// The approval gate's driver and log, wired in only when the global
/// auto-approval flag is enabled.
pub struct ApprovalInterlock<'a> {
    pub driver: &'a dyn ProviderDriver,
    pub log: &'a dyn ApprovalLog,
}

/// Everything the caller supplies to run a plan to completion.
pub struct RunConfig<'a, W: JournalWriter, C: Clock> {
    pub driver: &'a dyn ProviderDriver,
    pub journal: &'a Journal<W, C>,
    pub clock: &'a C,
    pub approval: Option<ApprovalInterlock<'a>>,
    pub abort: &'a AbortToken,
}

fn task_prompt(description: &str) -> String {
    format!(
        "Nightshift rules: no irreversible operations, no metered-API use, report and stop on \
         error, be concise.\n\nTask: {description}"
    )
}

/// Drive `state`'s tasks to completion, enforcing the safety gates before
/// every dispatch and journaling every status transition. Caller must already hold a `NightshiftGuard`.
pub async fn run<W: JournalWriter, C: Clock>(config: &RunConfig<'_, W, C>, mut state: WorkState) -> RunReport {
    let mut report = RunReport::new();
    let start = config.clock.now();
    let mut consecutive_errors: u32 = 0;
    let mut previous_failed = false;
    let mut previous_summary = String::new();

    let task_ids: Vec<TaskId> = state.tasks.iter().map(|t| t.id).collect();

    for (index, task_id) in task_ids.iter().enumerate() {
        let elapsed = config.clock.now() - start;

        if elapsed > TIME_LIMIT {
            mark_remaining(&mut state, &task_ids[index..], TaskStatus::Skipped, "time limit");
            report.stop_reason = Some(StopReason::TimeLimit);
            break;
        }

        if config.abort.is_requested() {
            mark_remaining(&mut state, &task_ids[index..], TaskStatus::Stopped, "stop requested");
            report.stop_reason = Some(StopReason::Aborted);
            break;
        }

        if consecutive_errors >= CONSECUTIVE_ERROR_LIMIT {
            mark_remaining(&mut state, &task_ids[index..], TaskStatus::Skipped, "consecutive error limit");
            report.stop_reason = Some(StopReason::ConsecutiveErrors);
            break;
        }

        if index > 0 {
            if let Some(interlock) = &config.approval {
                // Nightshift's threshold is stricter than the general
                // `consecutive_errors >= 3` safety gate: two consecutive
                // task failures force STOP outright, without consulting the
                // classifier, since by then the previous task's own failure
                // report already answers the question the gate would ask.
                // A single failure does not auto-stop; it still goes
                // through the classifier along with everything else.
                let interlock_tripped = previous_failed && consecutive_errors >= INTERLOCK_FAILURE_LIMIT;
                let (go, stop_note) = if interlock_tripped {
                    (false, "two consecutive task failures".to_string())
                } else {
                    let packet = ApprovalPacket {
                        phase: format!("nightshift task {}", index),
                        context: state.directive.clone(),
                        flags: ApprovalFlags::default(),
                        implementation_summary: previous_summary.clone(),
                        test_result: if previous_failed { TestResult::Fail } else { TestResult::Pass },
                        error_report: if previous_failed { Some(previous_summary.clone()) } else { None },
                    };
                    let record = approval::decide(interlock.driver, interlock.log, packet).await;
                    (record.approved, record.reason)
                };
                if !go {
                    mark_remaining(&mut state, &task_ids[index..], TaskStatus::Stopped, "approval gate stopped the run");
                    report.stop_reason = Some(StopReason::ApprovalStop(stop_note));
                    break;
                }
            }
        }

        let description = state.task_mut(*task_id).map(|t| t.description.clone()).unwrap_or_default();

        if let Some(token) = blocked_token(&description) {
            if let Some(task) = state.task_mut(*task_id) {
                task.status = TaskStatus::Skipped;
                task.notes = Some(format!("blocked token: {token}"));
            }
            let _ = config.journal.save(&state);
            report.push(TaskReport {
                id: *task_id,
                status: TaskStatus::Skipped,
                duration: Duration::ZERO,
                summary: format!("blocked token: {token}"),
            });
            previous_failed = false;
            continue;
        }

        if let Some(task) = state.task_mut(*task_id) {
            task.status = TaskStatus::InProgress;
        }
        let _ = config.journal.save(&state);

        let started = std::time::Instant::now();
        let response = config.driver.invoke(&task_prompt(&description), TASK_DEADLINE, None).await;
        let duration = started.elapsed();

        let (status, summary) = if response.is_error() {
            consecutive_errors += 1;
            previous_failed = true;
            (TaskStatus::Failed, format!("error: {}", truncate_summary(response.error.as_deref().unwrap_or(""))))
        } else {
            consecutive_errors = 0;
            previous_failed = false;
            (TaskStatus::Completed, summarize_output(&response.output))
        };

        if let Some(task) = state.task_mut(*task_id) {
            task.status = status;
            task.notes = Some(summary.clone());
        }
        state.last_progress = summary.clone();
        previous_summary = summary.clone();
        let _ = config.journal.save(&state);

        report.push(TaskReport {
            id: *task_id,
            status,
            duration,
            summary,
        });
    }

    if !state.has_open_work() {
        let _ = config.journal.clear();
    }

    report
}

fn mark_remaining(state: &mut WorkState, ids: &[TaskId], status: TaskStatus, note: &str) {
    for id in ids {
        if let Some(task) = state.task_mut(*id) {
            task.status = status;
            task.notes = Some(note.to_string());
        }
    }
}

/// Per-message size a chat transport is assumed to tolerate. A report
/// past this length must be split and delivered as several messages.
pub const REPORT_CHAR_LIMIT: usize = 4000;

/// Split `report` into chunks no longer than `REPORT_CHAR_LIMIT`
/// characters, breaking on line boundaries so no line is torn in half.
/// A single line longer than the limit is hard-cut as a last resort.
pub fn split_for_transport(report: &str) -> Vec<String> {
    if report.chars().count() <= REPORT_CHAR_LIMIT {
        return vec![report.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in report.split('\n') {
        let joined_len = current.chars().count() + usize::from(!current.is_empty()) + line.chars().count();
        if joined_len > REPORT_CHAR_LIMIT && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        while current.chars().count() > REPORT_CHAR_LIMIT {
            let rest: String = current.chars().skip(REPORT_CHAR_LIMIT).collect();
            current.truncate(current.char_indices().nth(REPORT_CHAR_LIMIT).map(|(i, _)| i).unwrap_or(current.len()));
            chunks.push(std::mem::replace(&mut current, rest));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Render the final summary message.
pub fn render_report(report: &RunReport) -> String {
    let mut lines = vec![format!(
        "Nightshift finished: {} completed, {} failed, {} skipped, {} stopped",
        report.completed, report.failed, report.skipped, report.stopped
    )];

    for task in &report.tasks {
        lines.push(format!(
            "{} task {} ({:.1}s): {}",
            task.status.icon(),
            task.id,
            task.duration.as_secs_f64(),
            task.summary
        ));
    }

    if report.failed > 0 {
        lines.push("Failed tasks:".to_string());
        for task in report.tasks.iter().filter(|t| t.status == TaskStatus::Failed) {
            lines.push(format!("- task {}: {}", task.id, task.summary));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{FakeClock, TaskId};
    use hub_storage::FsJournalWriter;

    fn blank_state(clock: &FakeClock, descriptions: &[&str]) -> WorkState {
        let now = clock.now();
        let tasks = descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| WorkTask::new(TaskId((i + 1) as u32), *d))
            .collect();
        WorkState {
            created_at: now,
            updated_at: now,
            assigned_by: "owner".into(),
            directive: "do the plan".into(),
            user_id: "u1".into(),
            chat_id: "c1".into(),
            username: "owner".into(),
            tasks,
            constraints: vec![],
            last_progress: String::new(),
            session_id: None,
            expires_at: now + hub_core::work::DEFAULT_EXPIRY,
        }
    }

    #[test]
    fn singleton_rejects_a_second_concurrent_acquire() {
        let guard_holder = NightshiftSingleton::new();
        let first = guard_holder.try_acquire();
        assert!(first.is_ok());
        assert!(matches!(guard_holder.try_acquire(), Err(crate::EngineError::NightshiftBusy)));
        drop(first);
        assert!(guard_holder.try_acquire().is_ok());
    }

    #[test]
    fn task_list_parses_lenient_prefixes_and_renumbers_from_one() {
        let body = "/nightshift\n5. Update README\n- Run tests\n* Ship it\nplain line";
        let tasks = parse_task_list(body);
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[0].id, TaskId(1));
        assert_eq!(tasks[0].description, "Update README");
        assert_eq!(tasks[1].description, "Run tests");
        assert_eq!(tasks[2].description, "Ship it");
        assert_eq!(tasks[3].description, "plain line");
    }

    #[test]
    fn blocked_token_detection_is_case_insensitive() {
        assert_eq!(blocked_token("Please run GIT PUSH origin main"), Some("git push"));
        assert_eq!(blocked_token("rm -Rf /tmp/x".to_ascii_lowercase().as_str()), Some("rm -rf"));
        assert_eq!(blocked_token("update the README"), None);
    }

    #[tokio::test]
    async fn blocked_task_is_skipped_without_ever_reaching_the_provider() {
        let driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Claude);
        driver.push(hub_adapters::FakeOutcome::Ok("done".into()));
        driver.push(hub_adapters::FakeOutcome::Ok("done".into()));

        let clock = FakeClock::new(chrono::Utc::now());
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::with_writer_and_clock(FsJournalWriter, FakeClock::new(clock.now()), dir.path().join("j.json"));

        let state = blank_state(&clock, &["Update README", "git push origin main", "Run tests"]);
        let abort = AbortToken::new();
        let config = RunConfig {
            driver: &driver,
            journal: &journal,
            clock: &clock,
            approval: None,
            abort: &abort,
        };
        let report = run(&config, state).await;

        assert_eq!(report.completed, 2);
        assert_eq!(report.skipped, 1);
        assert!(driver.prompts_seen().iter().all(|p| !p.to_lowercase().contains("git push")));
    }

    #[tokio::test]
    async fn three_consecutive_failures_skip_the_rest() {
        let driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Claude);
        for _ in 0..3 {
            driver.push(hub_adapters::FakeOutcome::Error("boom".into()));
        }

        let clock = FakeClock::new(chrono::Utc::now());
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::with_writer_and_clock(FsJournalWriter, FakeClock::new(clock.now()), dir.path().join("j.json"));
        let state = blank_state(&clock, &["a", "b", "c", "d", "e"]);
        let abort = AbortToken::new();
        let config = RunConfig {
            driver: &driver,
            journal: &journal,
            clock: &clock,
            approval: None,
            abort: &abort,
        };

        let report = run(&config, state).await;
        assert_eq!(report.failed, 3);
        assert_eq!(report.skipped, 2);
    }

    #[tokio::test]
    async fn journal_is_cleared_once_every_task_reaches_a_terminal_state() {
        let driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Claude);
        driver.push(hub_adapters::FakeOutcome::Ok("all done".into()));

        let clock = FakeClock::new(chrono::Utc::now());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.json");
        let journal = Journal::with_writer_and_clock(FsJournalWriter, FakeClock::new(clock.now()), path.clone());
        let state = blank_state(&clock, &["only task"]);
        let abort = AbortToken::new();
        let config = RunConfig {
            driver: &driver,
            journal: &journal,
            clock: &clock,
            approval: None,
            abort: &abort,
        };

        run(&config, state).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn two_consecutive_failures_trip_the_interlock_before_the_classifier_runs() {
        use crate::ports::fake::FakeApprovalLog;

        let driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Claude);
        driver.push(hub_adapters::FakeOutcome::Error("boom".into()));
        driver.push(hub_adapters::FakeOutcome::Error("boom again".into()));

        let gate_driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Codex);
        // The interlock should trip without ever consulting the gate, so no
        // outcome is queued for it; if the gate were called it would return
        // the FakeProviderDriver's empty-output default, which parses as
        // "format invalid" rather than forcing the interlock's own reason.
        let log = FakeApprovalLog::default();

        let clock = FakeClock::new(chrono::Utc::now());
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::with_writer_and_clock(FsJournalWriter, FakeClock::new(clock.now()), dir.path().join("j.json"));
        let state = blank_state(&clock, &["a", "b", "c"]);
        let abort = AbortToken::new();
        let config = RunConfig {
            driver: &driver,
            journal: &journal,
            clock: &clock,
            approval: Some(ApprovalInterlock {
                driver: &gate_driver,
                log: &log,
            }),
            abort: &abort,
        };

        let report = run(&config, state).await;
        assert_eq!(report.failed, 2);
        assert_eq!(report.stopped, 1);
        assert!(log.records.lock().is_empty());
        assert!(matches!(report.stop_reason, Some(StopReason::ApprovalStop(_))));
    }

    #[tokio::test]
    async fn a_single_failure_still_goes_through_the_classifier() {
        use crate::ports::fake::FakeApprovalLog;

        let driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Claude);
        driver.push(hub_adapters::FakeOutcome::Error("boom".into()));
        driver.push(hub_adapters::FakeOutcome::Ok("done".into()));

        let gate_driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Codex);
        gate_driver.push(hub_adapters::FakeOutcome::Ok("GO: one miss is tolerated".into()));
        let log = FakeApprovalLog::default();

        let clock = FakeClock::new(chrono::Utc::now());
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::with_writer_and_clock(FsJournalWriter, FakeClock::new(clock.now()), dir.path().join("j.json"));
        let state = blank_state(&clock, &["a", "b"]);
        let abort = AbortToken::new();
        let config = RunConfig {
            driver: &driver,
            journal: &journal,
            clock: &clock,
            approval: Some(ApprovalInterlock {
                driver: &gate_driver,
                log: &log,
            }),
            abort: &abort,
        };

        let report = run(&config, state).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.completed, 1);
        assert_eq!(log.records.lock().len(), 1);
    }

    #[tokio::test]
    async fn a_requested_abort_stops_before_the_next_dispatch() {
        let driver = hub_adapters::FakeProviderDriver::new(hub_core::ProviderId::Claude);
        driver.push(hub_adapters::FakeOutcome::Ok("done".into()));
        driver.push(hub_adapters::FakeOutcome::Ok("done".into()));

        let clock = FakeClock::new(chrono::Utc::now());
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::with_writer_and_clock(FsJournalWriter, FakeClock::new(clock.now()), dir.path().join("j.json"));
        let state = blank_state(&clock, &["a", "b", "c"]);
        let abort = AbortToken::new();
        abort.request();
        let config = RunConfig {
            driver: &driver,
            journal: &journal,
            clock: &clock,
            approval: None,
            abort: &abort,
        };

        let report = run(&config, state).await;
        assert_eq!(report.completed, 0);
        assert_eq!(report.stopped, 3);
        assert!(driver.prompts_seen().is_empty());
        assert!(matches!(report.stop_reason, Some(StopReason::Aborted)));
    }

    #[test]
    fn short_report_is_not_split() {
        let report = "short report body";
        assert_eq!(split_for_transport(report), vec![report.to_string()]);
    }

    #[test]
    fn long_report_is_split_at_line_boundaries_under_the_limit() {
        let line = "x".repeat(100);
        let report = std::iter::repeat(line.clone()).take(60).collect::<Vec<_>>().join("\n");
        assert!(report.chars().count() > REPORT_CHAR_LIMIT);

        let chunks = split_for_transport(&report);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= REPORT_CHAR_LIMIT);
        }
        assert_eq!(chunks.join("\n"), report);
    }

    #[test]
    fn a_single_line_longer_than_the_limit_is_hard_cut() {
        let report = "y".repeat(REPORT_CHAR_LIMIT * 2 + 10);
        let chunks = split_for_transport(&report);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= REPORT_CHAR_LIMIT);
        }
        assert_eq!(chunks.concat(), report);
    }
}
