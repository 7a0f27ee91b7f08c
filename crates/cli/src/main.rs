// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hub - local REPL for exercising the orchestration core without a real
//! chat transport.

use clap::Parser;
use hub_adapters::{ClaudeDriver, CodexDriver, GeminiDriver};
use hub_core::ProviderId;
use hub_daemon::{App, Config, ExternalPorts};
use hub_engine::ports::fake::{
    FakeApprovalLog, FakeChatHistoryStore, FakeChatTransport, FakeContextStore, FakeLearnedMemoryStore, FakeMemoryDocument, FakeSessionSummaryStore,
};
use std::io::Write;
use std::sync::Arc;

const CHAT_ID: &str = "repl";

#[derive(Parser)]
#[command(name = "hub", version, about = "Local REPL for exercising the orchestration core without a real chat transport")]
struct Cli {
    /// Send a single message non-interactively, print the reply, and exit
    /// instead of starting the REPL.
    #[arg(short = 'm', long = "message")]
    message: Option<String>,

    /// User id to dispatch as; must appear in the configured allowed-users
    /// list for anything gated behind approval.
    #[arg(short = 'u', long = "user", default_value = "local")]
    user_id: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hub: {e}");
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

    let app = App::new(config, ports, drivers);

    if let Some(message) = cli.message {
        let reply = app.dispatch(&cli.user_id, CHAT_ID, &message).await;
        println!("{reply}");
        app.drain_background().await;
        return;
    }

    if let Some(block) = app.boot_recovery_block() {
        println!("{block}");
    }

    println!("hub: type a message, `/nightshift`, `/debate`, or `/croppy`. ctrl-d to quit.");

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        line.clear();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let text = line.trim_end();
        if text.is_empty() {
            continue;
        }
        let reply = app.dispatch(&cli.user_id, CHAT_ID, text).await;
        println!("{reply}");
    }

    app.drain_background().await;
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn defaults_to_no_message_and_local_user() {
        let cli = Cli::try_parse_from(["hub"]).unwrap();
        assert_eq!(cli.message, None);
        assert_eq!(cli.user_id, "local");
    }

    #[test]
    fn message_and_user_flags_are_parsed() {
        let cli = Cli::try_parse_from(["hub", "-m", "status", "-u", "alice"]).unwrap();
        assert_eq!(cli.message, Some("status".to_string()));
        assert_eq!(cli.user_id, "alice");
    }
}
