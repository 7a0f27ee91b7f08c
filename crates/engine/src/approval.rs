// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! GO/STOP classifier gate at phase boundaries.

use crate::ports::ApprovalLog;
use hub_adapters::ProviderDriver;
use hub_core::{ApprovalPacket, ApprovalRecord, ProviderId};
use regex::Regex;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

const DEADLINE: Duration = Duration::from_secs(15);

const SYSTEM_PREAMBLE: &str = "\
You are a rule-applier, not a judge. Apply the following rules exactly.

GO conditions (all must hold): tests pass, no runtime error, no metered-API \
use, every spec MUST is satisfied, no existing test is broken, no \
irreversible operation occurred, no external-user impact, and a \
prerequisite summary is present.

STOP conditions (any one applies): any failure, metered-API use, an \
irreversible action, external-user impact, a risk flag, insufficient \
information, or any hesitation.

Respond with exactly one line: \"GO: <short reason>\" or \"STOP: <short reason>\".";

fn build_prompt(packet: &ApprovalPacket) -> String {
    format!(
        "{SYSTEM_PREAMBLE}\n\nPhase: {}\nContext: {}\nFlags: experiment={} production_impact={} urgent={}\n\
         Implementation summary: {}\nTest result: {:?}\nError report: {}",
        packet.phase,
        packet.context,
        packet.flags.experiment,
        packet.flags.production_impact,
        packet.flags.urgent,
        packet.implementation_summary,
        packet.test_result,
        packet.error_report.as_deref().unwrap_or("none"),
    )
}

#[allow(clippy::expect_used)]
fn decision_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(go|stop)\s*:\s*(.+)$").expect("constant regex pattern is valid"))
}

/// Parse the classifier's first line: `GO: …` → approved,
/// `STOP: …` → not approved, anything else → not approved with reason
/// "format invalid".
fn parse_decision(raw: &str) -> (bool, String) {
    let first_line = raw.lines().next().unwrap_or("");
    match decision_regex().captures(first_line) {
        Some(caps) => {
            let verdict = caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
            let reason = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
            (verdict == "go", reason)
        }
        None => (false, "format invalid".to_string()),
    }
}

/// Dispatch the packet to the approval provider and record the decision.
/// Timeout or any call error forces `approved=false`.
pub async fn decide(driver: &dyn ProviderDriver, log: &dyn ApprovalLog, packet: ApprovalPacket) -> ApprovalRecord {
    let started = Instant::now();
    let prompt = build_prompt(&packet);
    let response = driver.invoke(&prompt, DEADLINE, None).await;
    let elapsed = started.elapsed();

    let record = if let Some(error) = &response.error {
        let (timed_out, reason) = if error == "timeout" {
            (true, "timeout")
        } else {
            (false, "call failed")
        };
        ApprovalRecord::new(packet, false, reason, response.output, elapsed, timed_out, true)
    } else {
        let (approved, reason) = parse_decision(&response.output);
        ApprovalRecord::new(packet, approved, reason, response.output.clone(), elapsed, false, false)
    };

    if let Err(e) = log.record(&record).await {
        tracing::warn!(error = %e, "approval log write failed");
    }

    record
}

pub fn approval_provider() -> ProviderId {
    ProviderId::approval_provider()
}
