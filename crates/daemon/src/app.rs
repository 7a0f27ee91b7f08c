// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wires the orchestration core to a concrete set of provider drivers and
//! external collaborators, and dispatches incoming chat messages to the
//! right execution plan.

use crate::config::Config;
use crate::ports::ExternalPorts;
use hub_adapters::{CircuitBreakerConfig, CircuitBreakerRegistry, ProviderDriver};
use hub_core::{ChatRole, ProviderId, RouteKind, WorkState, WorkTask};
use hub_engine::nightshift::{AbortToken, ApprovalInterlock, NightshiftSingleton, RunConfig};
use hub_engine::postprocess::BackgroundRunner;
use hub_engine::{approval, council, enrichment, fanout, gc, nightshift, postprocess, recovery, router};
use hub_storage::{FsJournalWriter, Journal};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

const DEFAULT_ROLE_PREAMBLE: &str = "You are a helpful assistant integrated into a personal operations hub.";
const DEFAULT_ROUTE_FALLBACK: &str = "I didn't recognize a directive in that message.";
const STATIC_SYSTEM_RULES: &str = "Be concise. Prefer concrete, actionable answers over hedging.";

/// Everything the dispatcher needs to answer one message: the provider
/// drivers, the circuit breakers guarding them, the work-state journal,
/// the nightshift run guard, and the injected external collaborators.
pub struct App {
    pub config: Config,
    ports: ExternalPorts,
    drivers: Vec<(ProviderId, Arc<dyn ProviderDriver>)>,
    breakers: CircuitBreakerRegistry,
    journal: Journal<FsJournalWriter>,
    nightshift_guard: NightshiftSingleton,
    current_abort: SyncMutex<Option<Arc<AbortToken>>>,
    approval_enabled: AtomicBool,
    background: AsyncMutex<BackgroundRunner>,
    /// Per-user assistant-turn count, used to trigger a session summary
    /// every 20 turns.
    assistant_turns: SyncMutex<HashMap<String, u64>>,
    /// A recovery block read from a non-empty journal at boot, consumed
    /// into the first enriched prompt after restart and then cleared
    /// ("re-injects a context block into the next model turn").
    pending_recovery: SyncMutex<Option<String>>,
}

impl App {
    pub fn new(config: Config, ports: ExternalPorts, drivers: Vec<(ProviderId, Arc<dyn ProviderDriver>)>) -> Self {
        let journal_path = config.work_state_path.clone();
        let journal = Journal::new(journal_path);
        let pending_recovery = journal.load().ok().flatten().map(|state| recovery::render_recovery_block(&state));
        Self {
            config,
            ports,
            drivers,
            breakers: CircuitBreakerRegistry::new(),
            journal,
            nightshift_guard: NightshiftSingleton::new(),
            current_abort: SyncMutex::new(None),
            approval_enabled: AtomicBool::new(false),
            background: AsyncMutex::new(BackgroundRunner::new()),
            assistant_turns: SyncMutex::new(HashMap::new()),
            pending_recovery: SyncMutex::new(pending_recovery),
        }
    }

    fn driver_for(&self, provider: ProviderId) -> Option<Arc<dyn ProviderDriver>> {
        self.drivers.iter().find(|(p, _)| *p == provider).map(|(_, d)| d.clone())
    }

    /// Peek at the pending restart-recovery block without consuming it, for
    /// a startup log line. The next enriched prompt still
    /// consumes it exactly once.
    pub fn boot_recovery_block(&self) -> Option<String> {
        self.pending_recovery.lock().clone()
    }

    /// Dispatch one incoming message and return the reply text. Chat history is appended for both the user message and the
    /// assistant reply; post-process jobs are queued on the background
    /// runner rather than awaited.
    pub async fn dispatch(&self, user_id: &str, chat_id: &str, text: &str) -> String {
        let _ = self.ports.chat_history.append(user_id, ChatRole::User, text).await;

        let trimmed = text.trim();
        let reply = if let Some(body) = trimmed.strip_prefix("/nightshift") {
            self.handle_nightshift(user_id, chat_id, body).await
        } else if let Some(topic) = trimmed.strip_prefix("/debate") {
            self.handle_debate(topic.trim()).await
        } else if let Some(rest) = trimmed.strip_prefix("/croppy") {
            self.handle_croppy(rest.trim())
        } else {
            self.handle_route(user_id, trimmed).await
        };

        let _ = self.ports.chat_history.append(user_id, ChatRole::Assistant, &reply).await;
        self.queue_postprocess(user_id, text, &reply).await;
        reply
    }

    async fn handle_route(&self, user_id: &str, text: &str) -> String {
        let route = router::parse(text);
        match route.kind {
            RouteKind::Single(provider) => self.dispatch_single(user_id, provider, &route.payload).await,
            RouteKind::FanOut => self.dispatch_fanout(user_id, &route.payload).await,
            RouteKind::Council => self.dispatch_council(&route.payload).await,
            RouteKind::Default => DEFAULT_ROUTE_FALLBACK.to_string(),
        }
    }

    async fn enriched_prompt(&self, user_id: &str, provider: ProviderId, payload: &str) -> String {
        let breaker = self.breakers.get_or_insert("memory-service", CircuitBreakerConfig::memory_service);
        let memory_pack = enrichment::fetch_memory_pack(self.ports.memory_document.as_ref(), &self.config.memory_doc_id, &breaker).await;
        let history_rows = self.ports.chat_history.recent(user_id, 50).await.unwrap_or_default();
        let history = enrichment::format_history(&history_rows);

        let recovery_block = self.pending_recovery.lock().take();
        let system_block = match (provider == ProviderId::Gemini, &recovery_block) {
            (true, _) => Some(enrichment::build_system_block(STATIC_SYSTEM_RULES, None, recovery_block.as_deref())),
            (false, Some(block)) => Some(block.clone()),
            (false, None) => None,
        };

        enrichment::compose_prompt(provider, system_block.as_deref(), DEFAULT_ROLE_PREAMBLE, &memory_pack, &history, payload)
    }

    async fn dispatch_single(&self, user_id: &str, provider: ProviderId, payload: &str) -> String {
        let Some(driver) = self.driver_for(provider) else {
            return format!("no driver configured for {}", provider.display_name());
        };
        let prompt = self.enriched_prompt(user_id, provider, payload).await;
        let breaker = self.breakers.get_or_insert(&provider.to_string(), CircuitBreakerConfig::model_backend);
        let deadline = provider.default_deadline();
        let fallback = hub_core::ProviderResponse::failed(provider, "upstream unavailable", std::time::Duration::ZERO);
        let response = breaker
            .execute(
                || async move {
                    let response = driver.invoke(&prompt, deadline, None).await;
                    if response.is_error() {
                        Err(())
                    } else {
                        Ok(response)
                    }
                },
                fallback,
            )
            .await;
        if response.is_error() {
            format!("{}: {}", provider.display_name(), response.error.unwrap_or_default())
        } else {
            response.output
        }
    }

    async fn dispatch_fanout(&self, user_id: &str, payload: &str) -> String {
        let prompt = self.enriched_prompt(user_id, ProviderId::Claude, payload).await;
        let responses = fanout::run(&self.drivers, &self.breakers, &prompt).await;
        fanout::assemble(&responses)
    }

    async fn dispatch_council(&self, topic: &str) -> String {
        let record = council::run(&self.drivers, topic).await;
        council::render(&record)
    }

    async fn handle_debate(&self, topic: &str) -> String {
        if topic.is_empty() {
            return "usage: /debate <topic>".to_string();
        }
        self.dispatch_council(topic).await
    }

    fn handle_croppy(&self, arg: &str) -> String {
        match arg.to_ascii_lowercase().as_str() {
            "enable" => {
                self.approval_enabled.store(true, Ordering::SeqCst);
                "approval gate enabled".to_string()
            }
            "disable" => {
                self.approval_enabled.store(false, Ordering::SeqCst);
                "approval gate disabled".to_string()
            }
            "status" | "" => format!(
                "approval gate is {}",
                if self.approval_enabled.load(Ordering::SeqCst) { "enabled" } else { "disabled" }
            ),
            other => format!("unknown /croppy argument: {other}"),
        }
    }

    async fn handle_nightshift(&self, user_id: &str, chat_id: &str, body: &str) -> String {
        let trimmed = body.trim_start();
        if trimmed.eq_ignore_ascii_case("stop") {
            return match self.current_abort.lock().as_ref() {
                Some(token) => {
                    token.request();
                    "stop requested, winding down after the current task".to_string()
                }
                None => "no nightshift run is in progress".to_string(),
            };
        }
        if trimmed.eq_ignore_ascii_case("status") {
            return match self.journal.load() {
                Ok(Some(state)) => recovery::render_recovery_block(&state),
                Ok(None) => "no plan in progress".to_string(),
                Err(e) => format!("journal read failed: {e}"),
            };
        }

        let guard = match self.nightshift_guard.try_acquire() {
            Ok(guard) => guard,
            Err(e) => return e.to_string(),
        };

        let tasks: Vec<WorkTask> = nightshift::parse_task_list(&format!("/nightshift\n{body}"));
        if tasks.is_empty() {
            return "no tasks found in the message body".to_string();
        }

        let now = chrono::Utc::now();
        let directive = format!("nightshift plan with {} task(s)", tasks.len());
        let state = WorkState {
            created_at: now,
            updated_at: now,
            assigned_by: user_id.to_string(),
            directive,
            user_id: user_id.to_string(),
            chat_id: chat_id.to_string(),
            username: user_id.to_string(),
            tasks,
            constraints: vec![],
            last_progress: String::new(),
            session_id: None,
            expires_at: now + hub_core::work::DEFAULT_EXPIRY,
        };

        let abort = Arc::new(AbortToken::new());
        *self.current_abort.lock() = Some(abort.clone());

        let driver = match self.driver_for(ProviderId::nightshift_provider()) {
            Some(d) => d,
            None => {
                *self.current_abort.lock() = None;
                return "no driver configured for the nightshift provider".to_string();
            }
        };
        let gate_driver = self.driver_for(approval::approval_provider());

        let approval_interlock = if self.approval_enabled.load(Ordering::SeqCst) {
            gate_driver.as_deref().map(|d| ApprovalInterlock {
                driver: d,
                log: self.ports.approval_log.as_ref(),
            })
        } else {
            None
        };

        let clock = hub_core::SystemClock;
        let run_config = RunConfig {
            driver: driver.as_ref(),
            journal: &self.journal,
            clock: &clock,
            approval: approval_interlock,
            abort: abort.as_ref(),
        };

        let report = nightshift::run(&run_config, state).await;
        *self.current_abort.lock() = None;
        drop(guard);
        self.deliver_report(chat_id, &nightshift::render_report(&report)).await
    }

    /// Deliver a nightshift report. Reports within the transport's
    /// per-message size are returned for the caller to send as usual;
    /// longer ones are split at a safe boundary and sent sequentially
    /// through the transport directly, with one retry per chunk on
    /// failure.
    async fn deliver_report(&self, chat_id: &str, report: &str) -> String {
        if report.chars().count() <= nightshift::REPORT_CHAR_LIMIT {
            return report.to_string();
        }

        let chunks = nightshift::split_for_transport(report);
        let total = chunks.len();
        for chunk in &chunks {
            if self.ports.transport.send_reply(chat_id, chunk).await.is_err() {
                if let Err(e) = self.ports.transport.send_reply(chat_id, chunk).await {
                    tracing::warn!(%e, "nightshift report chunk dropped after retry");
                }
            }
        }
        format!("nightshift report delivered in {total} part(s)")
    }

    async fn queue_postprocess(&self, user_id: &str, incoming: &str, reply: &str) {
        let mut runner = self.background.lock().await;

        if postprocess::detect_code_change(reply).is_some() {
            if let (Some(reviewer), Some(second)) = (self.driver_for(ProviderId::Gemini), self.driver_for(ProviderId::Codex)) {
                let transport = self.ports.transport.clone();
                let chat_id = user_id.to_string();
                let reply = reply.to_string();
                runner.spawn("auto-review", move || {
                    let reviewer = reviewer.clone();
                    let second = second.clone();
                    let transport = transport.clone();
                    let chat_id = chat_id.clone();
                    let reply = reply.clone();
                    async move {
                        if let Some(notes) = postprocess::auto_review(&reply, reviewer.as_ref(), second.as_ref()).await {
                            transport.send_reply(&chat_id, &notes).await?;
                        }
                        Ok(())
                    }
                });
            }
        }

        let memory = self.ports.learned_memory.clone();
        let user_id_owned = user_id.to_string();
        let incoming_owned = incoming.to_string();
        runner.spawn("learned-memory", move || {
            let memory = memory.clone();
            let user_id = user_id_owned.clone();
            let message = incoming_owned.clone();
            async move {
                postprocess::persist_learned_memory(memory.as_ref(), &user_id, &message).await?;
                Ok(())
            }
        });

        let context = self.ports.context.clone();
        let user_id_owned = user_id.to_string();
        let reply_owned = reply.to_string();
        runner.spawn("context-merge", move || {
            let context = context.clone();
            let user_id = user_id_owned.clone();
            let text = reply_owned.clone();
            async move { postprocess::merge_context(context.as_ref(), &user_id, &text).await }
        });

        let turn_count = {
            let mut turns = self.assistant_turns.lock();
            let count = turns.entry(user_id.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if postprocess::should_summarize(turn_count) {
            if let Some(summarizer) = self.driver_for(ProviderId::summarizer_provider()) {
                let history = self.ports.chat_history.clone();
                let summaries = self.ports.session_summaries.clone();
                let user_id_owned = user_id.to_string();
                runner.spawn("session-summary", move || {
                    let history = history.clone();
                    let summaries = summaries.clone();
                    let summarizer = summarizer.clone();
                    let user_id = user_id_owned.clone();
                    async move { postprocess::run_session_summary(history.as_ref(), summaries.as_ref(), summarizer.as_ref(), &user_id).await }
                });
            }
        }
    }

    /// Drain every in-flight background job; call on a timer and at
    /// shutdown so nothing is left unjoined.
    pub async fn drain_background(&self) {
        self.background.lock().await.drain().await;
    }

    pub async fn run_gc(&self) -> gc::GcReport {
        gc::run(
            self.ports.learned_memory.as_ref(),
            self.ports.chat_history.as_ref(),
            self.ports.session_summaries.as_ref(),
            &self.config.allowed_users,
            chrono::Utc::now(),
        )
        .await
    }
}
