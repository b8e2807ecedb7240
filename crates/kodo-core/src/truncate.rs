// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use anyhow::Context;
use tracing::debug;

use kodo_model::Provider;

use crate::history::History;

/// Shrink history to fit the provider's effective input budget.
///
/// `budget = context_window − reserved_output`, where `reserved_output` is
/// the provider's advertised max output tokens.  When the reservation
/// swallows the whole window the budget collapses and history is left
/// intact, since there is nothing sensible to trim against.
///
/// Entries are dropped oldest-first starting at index 1; the goal at index
/// 0 is never touched and `model`+`function` pairs fall together.  The
/// number of reduction attempts is bounded by the initial history length,
/// so a pathological estimator that never reports a reduction costs O(n)
/// estimator calls, never an unbounded loop.  Estimator failure aborts the
/// turn.
pub async fn truncate_history(
    provider: &dyn Provider,
    history: &mut History,
) -> anyhow::Result<()> {
    let caps = provider.capabilities();
    let budget = caps.max_context_tokens.saturating_sub(caps.max_output_tokens);
    if budget == 0 {
        return Ok(());
    }

    let mut estimate = provider
        .count_tokens(history.messages())
        .await
        .context("counting history tokens")?;
    if estimate <= budget {
        return Ok(());
    }

    let mut attempts = history.len();
    while estimate > budget && history.len() > 1 && attempts > 0 {
        attempts -= 1;
        let span = history.head_span()?;
        if span == 0 {
            break;
        }
        history.drop_head(span);
        estimate = provider
            .count_tokens(history.messages())
            .await
            .context("counting history tokens")?;
    }

    debug!(
        remaining = history.len(),
        estimate, budget, "history truncated"
    );
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
