// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hubd - standalone runner for the orchestration core.
//!
//! Wires the three provider CLIs/APIs up to [`hub_daemon::App`] with
//! in-memory stand-ins for the chat transport, relational store, and
//! document service. A production deployment links against the `hub-daemon`
//! library directly and supplies its own [`hub_daemon::ExternalPorts`]
//! instead of running this binary unmodified.

use hub_adapters::{ClaudeDriver, CodexDriver, GeminiDriver};
use hub_core::ProviderId;
use hub_daemon::{App, Config, ExternalPorts};
use hub_engine::ports::fake::{
    FakeApprovalLog, FakeChatHistoryStore, FakeChatTransport, FakeContextStore, FakeLearnedMemoryStore, FakeMemoryDocument, FakeSessionSummaryStore,
};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

#[allow(clippy::expect_used)]
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hubd: {e}");
            std::process::exit(1);
        }
    };

    let ports = ExternalPorts {
        transport: Arc::new(FakeChatTransport::default()),
        chat_history: Arc::new(FakeChatHistoryStore::default()),
        learned_memory: Arc::new(FakeLearnedMemoryStore::default()),
        session_summaries: Arc::new(FakeSessionSummaryStore::default()),
        context: Arc::new(FakeContextStore::default()),
        approval_log: Arc::new(FakeApprovalLog::default()),
        memory_document: Arc::new(FakeMemoryDocument::default()),
    };

    let drivers: Vec<(ProviderId, Arc<dyn hub_adapters::ProviderDriver>)> = vec![
        (ProviderId::Claude, Arc::new(ClaudeDriver::new())),
        (ProviderId::Gemini, Arc::new(GeminiDriver::new())),
        (ProviderId::Codex, Arc::new(CodexDriver::new(hub_adapters::env::codex_api_key()))),
    ];

    let app = Arc::new(App::new(config, ports, drivers));

    if let Some(block) = app.boot_recovery_block() {
        info!(recovery_block = %block, "recovered in-progress work state from journal");
    }

    let gc_handle = hub_daemon::gc_scheduler::spawn(app.clone());

    info!("hubd ready");

    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    gc_handle.abort();
    app.drain_background().await;
    info!("hubd stopped");
}
