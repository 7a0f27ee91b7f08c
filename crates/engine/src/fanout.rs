// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent dispatch to all providers with partial-failure tolerance.

use hub_adapters::{CircuitBreakerRegistry, ProviderDriver};
use hub_core::{ProviderId, ProviderResponse};
use std::sync::Arc;
use std::time::Duration;

const SECTION_CHAR_LIMIT: usize = 500;
const TRUNCATION_SUFFIX: &str = "...(truncated)";
/// A sentence boundary must fall within the final 50% of the truncation
/// window to be used in place of a hard cut.
const BOUNDARY_SEARCH_FRACTION: f64 = 0.5;

/// Run every provider concurrently, each wrapped in its own circuit
/// breaker, and return one response per provider ("no
/// cross-call ordering guarantee; wait for all to complete"). Each call
/// runs on its own task so the total wall-clock is bounded by the
/// slowest provider's deadline, not their sum.
pub async fn run(
    drivers: &[(ProviderId, Arc<dyn ProviderDriver>)],
    breakers: &CircuitBreakerRegistry,
    prompt: &str,
) -> Vec<ProviderResponse> {
    let mut handles = Vec::with_capacity(drivers.len());
    for (provider, driver) in drivers {
        let provider = *provider;
        let driver = driver.clone();
        let prompt = prompt.to_string();
        let breaker = breakers.get_or_insert(&provider.to_string(), hub_adapters::CircuitBreakerConfig::model_backend);
        handles.push(tokio::spawn(async move {
            let deadline = provider.default_deadline();
            breaker
                .execute(
                    || async move {
                        let response = driver.invoke(&prompt, deadline, None).await;
                        if response.is_error() {
                            Err(())
                        } else {
                            Ok(response)
                        }
                    },
                    ProviderResponse::failed(provider, "upstream unavailable", Duration::ZERO),
                )
                .await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(response) => results.push(response),
            Err(_) => tracing::warn!("fan-out task panicked"),
        }
    }
    results
}

/// Assemble the unified fan-out response: one section per provider, each
/// truncated to 500 characters preserving a sentence boundary where
/// possible.
pub fn assemble(responses: &[ProviderResponse]) -> String {
    responses
        .iter()
        .map(|r| {
            let body = match &r.error {
                Some(err) => format!("\u{26A0} {err}{}", if r.output.is_empty() { String::new() } else { format!(" — {}", r.output) }),
                None => r.output.clone(),
            };
            format!("{} {}\n{}", r.provider.emblem(), r.provider.display_name(), truncate_section(&body))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_section(body: &str) -> String {
    if body.chars().count() <= SECTION_CHAR_LIMIT {
        return body.to_string();
    }

    let window: String = body.chars().take(SECTION_CHAR_LIMIT).collect();
    let search_start = (SECTION_CHAR_LIMIT as f64 * BOUNDARY_SEARCH_FRACTION) as usize;

    let boundary = window
        .char_indices()
        .filter(|(byte_idx, ch)| {
            let char_idx = window[..*byte_idx].chars().count();
            char_idx >= search_start && (*ch == '\n' || *ch == '.' || *ch == '\u{3002}')
        })
        .next_back();

    match boundary {
        Some((byte_idx, ch)) => {
            let cut = byte_idx + ch.len_utf8();
            window[..cut].to_string()
        }
        None => format!("{window}{TRUNCATION_SUFFIX}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_adapters::FakeOutcome;
    use hub_adapters::FakeProviderDriver;

    fn driver(provider: ProviderId) -> (ProviderId, Arc<dyn ProviderDriver>, FakeProviderDriver) {
        let fake = FakeProviderDriver::new(provider);
        (provider, Arc::new(fake.clone()), fake)
    }

    #[tokio::test]
    async fn partial_failure_still_returns_a_section_per_provider() {
        let (a_id, a_driver, a_fake) = driver(ProviderId::Claude);
        let (b_id, b_driver, b_fake) = driver(ProviderId::Gemini);
        let (c_id, c_driver, c_fake) = driver(ProviderId::Codex);

        a_fake.push(FakeOutcome::Ok("alpha".into()));
        b_fake.push(FakeOutcome::Timeout("".into()));
        c_fake.push(FakeOutcome::Ok("gamma".into()));

        let drivers = vec![(a_id, a_driver), (b_id, b_driver), (c_id, c_driver)];
        let breakers = CircuitBreakerRegistry::new();
        let responses = run(&drivers, &breakers, "ping").await;

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[0].provider, ProviderId::Claude);
        assert!(!responses[0].is_error());
        assert!(responses[1].is_error());
        assert!(!responses[2].is_error());

        let assembled = assemble(&responses);
        assert!(assembled.contains("alpha"));
        assert!(assembled.contains('\u{26A0}'));
        assert!(assembled.contains("gamma"));
    }

    #[tokio::test(start_paused = true)]
    async fn two_simultaneous_hangs_run_concurrently_not_sequentially() {
        let (a_id, a_driver, a_fake) = driver(ProviderId::Claude);
        let (b_id, b_driver, b_fake) = driver(ProviderId::Gemini);
        let (c_id, c_driver, c_fake) = driver(ProviderId::Codex);

        a_fake.push(FakeOutcome::Hang);
        b_fake.push(FakeOutcome::Hang);
        c_fake.push(FakeOutcome::Ok("gamma".into()));

        let drivers = vec![(a_id, a_driver), (b_id, b_driver), (c_id, c_driver)];
        let breakers = CircuitBreakerRegistry::new();

        let started = tokio::time::Instant::now();
        let responses = run(&drivers, &breakers, "ping").await;
        let elapsed = started.elapsed();

        let slowest = drivers.iter().map(|(p, _)| p.default_deadline()).max().unwrap();
        assert!(
            elapsed < slowest + Duration::from_secs(30),
            "two hung providers ran sequentially: elapsed {elapsed:?} vs one deadline {slowest:?}"
        );
        assert_eq!(responses.len(), 3);
    }

    #[test]
    fn section_longer_than_limit_is_truncated() {
        let long = "x".repeat(800);
        let truncated = truncate_section(&long);
        assert!(truncated.ends_with(TRUNCATION_SUFFIX));
        assert!(truncated.chars().count() <= SECTION_CHAR_LIMIT + TRUNCATION_SUFFIX.chars().count());
    }

    #[test]
    fn section_prefers_a_sentence_boundary_near_the_limit() {
        let mut text = "a".repeat(260);
        text.push('.');
        text.push_str(&"b".repeat(260));
        let truncated = truncate_section(&text);
        assert!(truncated.ends_with('.'));
        assert!(!truncated.ends_with(TRUNCATION_SUFFIX));
    }
}
