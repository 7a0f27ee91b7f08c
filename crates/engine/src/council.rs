// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Three-round scatter/gather debate across the provider set.

use hub_adapters::ProviderDriver;
use hub_core::{CouncilRecord, CouncilRound, ProviderId, ProviderResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};

const ROUND_DEADLINE: Duration = Duration::from_secs(120);
const SYNTHESIS_DEADLINE: Duration = Duration::from_secs(150);

fn role_preamble(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Claude => "You are the Disruptor: challenge assumptions and propose bold alternatives.",
        ProviderId::Gemini => "You are the Realist: ground every proposal in constraints and feasibility.",
        ProviderId::Codex => "You are the Humanizer: weigh the proposal against user experience and empathy.",
    }
}

fn round1_prompt(provider: ProviderId, topic: &str) -> String {
    format!(
        "{}\n\nTopic: {topic}\n\nRespond with: a title, three key points, five steps, one top risk, one mitigation.",
        role_preamble(provider)
    )
}

fn round2_prompt(provider: ProviderId, reference_block: &str) -> String {
    format!(
        "{}\n\nPeer proposals so far:\n{reference_block}\n\nRespond with: two good points, two fatal gaps, two improvements.",
        role_preamble(provider)
    )
}

fn round3_prompt(topic: &str, round1: &CouncilRound, round2: &CouncilRound) -> String {
    let mut sections = vec![format!("Topic: {topic}"), "Round 1 proposals:".to_string()];
    for r in round1 {
        sections.push(format!("[{}] {}", r.provider.display_name(), r.output));
    }
    sections.push("Round 2 critiques:".to_string());
    for r in round2 {
        sections.push(format!("[{}] {}", r.provider.display_name(), r.output));
    }
    sections.push(
        "As chairperson, respond with: three consensus points, three disagreement points \
         (with reason for retaining each), a final proposal (purpose -> design -> operations -> \
         next move), and five TODOs for the next 24 hours."
            .to_string(),
    );
    sections.join("\n\n")
}

fn find_driver(drivers: &[(ProviderId, Arc<dyn ProviderDriver>)], provider: ProviderId) -> Option<Arc<dyn ProviderDriver>> {
    drivers.iter().find(|(p, _)| *p == provider).map(|(_, d)| d.clone())
}

async fn dispatch_round(
    drivers: &[(ProviderId, Arc<dyn ProviderDriver>)],
    prompts: Vec<(ProviderId, String)>,
    deadline: Duration,
) -> CouncilRound {
    let mut handles = Vec::new();
    for (provider, prompt) in prompts {
        match find_driver(drivers, provider) {
            Some(driver) => {
                handles.push(tokio::spawn(async move { driver.invoke(&prompt, deadline, None).await }));
            }
            None => {
                tracing::warn!(%provider, "no driver registered for council participant");
            }
        }
    }

    let mut responses = Vec::with_capacity(handles.len());
    for handle in handles {
        if let Ok(response) = handle.await {
            responses.push(response);
        }
    }
    responses
}

fn survivors(round: &CouncilRound) -> CouncilRound {
    round.iter().filter(|r| !r.is_error()).cloned().collect()
}

/// Run the full three-round debate. `drivers` must cover every provider
/// that might appear in a prompt (typically `ProviderId::ALL`).
pub async fn run(drivers: &[(ProviderId, Arc<dyn ProviderDriver>)], topic: &str) -> CouncilRecord {
    let started = Instant::now();

    let round1_prompts: Vec<_> = drivers
        .iter()
        .map(|(p, _)| (*p, round1_prompt(*p, topic)))
        .collect();
    let round1 = dispatch_round(drivers, round1_prompts, ROUND_DEADLINE).await;
    let round1_survivors = survivors(&round1);

    if round1_survivors.is_empty() {
        return CouncilRecord {
            topic: topic.to_string(),
            round1,
            round2: Vec::new(),
            synthesis: ProviderResponse::failed(
                ProviderId::council_synthesizer(),
                "all round-1 providers failed",
                started.elapsed(),
            ),
            total_elapsed: started.elapsed(),
        };
    }

    let reference_block = round1_survivors
        .iter()
        .map(|r| format!("[{}] {}", r.provider.display_name(), r.output))
        .collect::<Vec<_>>()
        .join("\n\n");

    let round2_prompts: Vec<_> = round1_survivors
        .iter()
        .map(|r| (r.provider, round2_prompt(r.provider, &reference_block)))
        .collect();
    let round2 = dispatch_round(drivers, round2_prompts, ROUND_DEADLINE).await;
    let round2_survivors = survivors(&round2);

    let synthesizer = ProviderId::council_synthesizer();
    let synth_prompt = round3_prompt(topic, &round1_survivors, &round2_survivors);
    let synthesis = match find_driver(drivers, synthesizer) {
        Some(driver) => driver.invoke(&synth_prompt, SYNTHESIS_DEADLINE, None).await,
        None => ProviderResponse::failed(synthesizer, "no driver registered for synthesizer", started.elapsed()),
    };

    CouncilRecord {
        topic: topic.to_string(),
        round1,
        round2,
        synthesis,
        total_elapsed: started.elapsed(),
    }
}

/// Render the surfaced message for a council record. When the synthesizer
/// failed, round-1 survivors are assembled verbatim under a "Fallback"
/// heading rather than failing the whole record.
pub fn render(record: &CouncilRecord) -> String {
    if record.all_failed() {
        return format!(
            "Council debate on \"{}\" failed: every provider was unreachable.\n{}",
            record.topic,
            record
                .round1
                .iter()
                .map(|r| format!("- {}: {}", r.provider.display_name(), r.error.clone().unwrap_or_default()))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    if let Some(error) = &record.synthesis.error {
        let fallback = survivors(&record.round1)
            .iter()
            .map(|r| format!("[{}] {}", r.provider.display_name(), r.output))
            .collect::<Vec<_>>()
            .join("\n\n");
        return format!(
            "Synthesis failed ({error}). Fallback — round-1 survivors:\n\n{fallback}"
        );
    }

    record.synthesis.output.clone()
}
