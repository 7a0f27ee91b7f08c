// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Restart-recovery context block: when a bootstrap layer finds a
//! non-empty journal on disk, it re-injects this block into the next
//! model turn so pending work is not silently dropped.

use hub_core::WorkState;

const TITLE: &str = "Resuming interrupted work";
const CLOSING_INSTRUCTION: &str =
    "Continue the pending tasks above from where they left off; do not restart completed work.";

/// Render the recovery block for a loaded work state: title, directive,
/// constraints, a checklist of tasks with status icons, the last-progress
/// note, and a closing instruction.
pub fn render_recovery_block(state: &WorkState) -> String {
    let mut lines = vec![TITLE.to_string(), String::new(), format!("Directive: {}", state.directive)];

    if !state.constraints.is_empty() {
        lines.push(String::new());
        lines.push("Constraints:".to_string());
        for constraint in &state.constraints {
            lines.push(format!("- {constraint}"));
        }
    }

    lines.push(String::new());
    lines.push("Tasks:".to_string());
    for task in &state.tasks {
        lines.push(format!("{} {}. {}", task.status.icon(), task.id, task.description));
    }

    if !state.last_progress.is_empty() {
        lines.push(String::new());
        lines.push(format!("Last progress: {}", state.last_progress));
    }

    lines.push(String::new());
    lines.push(CLOSING_INSTRUCTION.to_string());

    lines.join("\n")
}
