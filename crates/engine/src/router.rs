// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Prefix parsing and execution-plan classification.

use hub_core::{ProviderId, RouteKind, RouteResult};

/// Parse the leading prefix of an incoming message. Case-insensitive,
/// first match wins; no prefix falls through to `RouteKind::Default`.
///
/// Alongside the canonical single-letter forms (`A:`, `B:`, `C:`), a
/// provider's display name is accepted as an alias (`Gemini:` routes the
/// same as `B:`) — the two forms never collide, and scenario-driven
/// callers tend to type the name they know rather than the letter.
pub fn parse(message: &str) -> RouteResult {
    let trimmed = message.trim_start();
    let lower = trimmed.to_ascii_lowercase();

    let mut prefixes: Vec<(String, RouteKind)> = vec![
        ("all:".to_string(), RouteKind::FanOut),
        ("council:".to_string(), RouteKind::Council),
    ];
    for provider in ProviderId::ALL {
        prefixes.push((format!("{}:", canonical_letter(provider)), RouteKind::Single(provider)));
        prefixes.push((
            format!("{}:", provider.display_name().to_ascii_lowercase()),
            RouteKind::Single(provider),
        ));
    }
    // Longest prefix first so a display-name alias isn't shadowed by
    // unrelated shorter matches.
    prefixes.sort_by_key(|(p, _)| std::cmp::Reverse(p.len()));

    for (prefix, kind) in &prefixes {
        if lower.starts_with(prefix.as_str()) {
            let payload = trimmed[prefix.len()..].trim_start().to_string();
            return RouteResult::new(*kind, payload);
        }
    }

    RouteResult::new(RouteKind::Default, trimmed.to_string())
}

/// The single-letter prefix form (`^A:`, `^B:`, `^C:`).
fn canonical_letter(provider: ProviderId) -> &'static str {
    match provider {
        ProviderId::Claude => "a",
        ProviderId::Gemini => "b",
        ProviderId::Codex => "c",
    }
}
