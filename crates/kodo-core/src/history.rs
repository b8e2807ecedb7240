// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use kodo_model::{Message, Role, ToolCall, ToolResult};

/// Conversation history for one orchestrator run.
///
/// Invariants (see [`History::verify`]):
/// 1. index 0 is the original user goal and never moves;
/// 2. every `Function` message immediately follows the `Model` message
///    whose `tool_calls` it answers, matched element-wise by position (and
///    by id when both sides carry non-empty ids);
/// 3. the only structural mutation is dropping a contiguous span that
///    starts at index 1 (truncation).
///
/// Created empty at Run start, seeded with the goal, mutated only by the
/// owning orchestrator task, discarded at Run exit.
#[derive(Debug)]
pub struct History {
    messages: Vec<Message>,
}

impl History {
    pub fn new(goal: &str) -> Self {
        Self {
            messages: vec![Message::user(goal)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The original user goal (index 0).
    pub fn goal(&self) -> &str {
        &self.messages[0].content
    }

    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Append a `model` tool-call message and its `function` result message
    /// back-to-back.  This is the only way tool turns enter history, so the
    /// pairing invariant holds by construction; mismatched lengths are a
    /// caller bug.
    pub fn push_tool_turn(
        &mut self,
        calls: Vec<ToolCall>,
        results: Vec<ToolResult>,
    ) -> anyhow::Result<()> {
        if calls.len() != results.len() {
            anyhow::bail!(
                "internal error: {} tool calls but {} results",
                calls.len(),
                results.len()
            );
        }
        self.messages.push(Message::model_tool_calls(calls));
        self.messages.push(Message::function_results(results));
        Ok(())
    }

    /// Length of the droppable span at index 1: a `model` message carrying
    /// tool calls is dropped together with its `function` partner; any
    /// other message stands alone.  A `function` head means the pairing
    /// invariant is already broken: fail fast, this is a bug.
    pub(crate) fn head_span(&self) -> anyhow::Result<usize> {
        let head = match self.messages.get(1) {
            Some(m) => m,
            None => return Ok(0),
        };
        match head.role {
            Role::Function => anyhow::bail!(
                "internal error: orphan function message at history index 1"
            ),
            Role::Model if !head.tool_calls.is_empty() => {
                match self.messages.get(2) {
                    Some(m) if m.role == Role::Function => Ok(2),
                    // A model tool-call message whose results never landed
                    // (e.g. the run was cut mid-turn) drops alone.
                    _ => Ok(1),
                }
            }
            _ => Ok(1),
        }
    }

    /// Drop `count` messages starting at index 1.  Used only by the
    /// truncator, after `head_span` decided the pair boundary.
    pub(crate) fn drop_head(&mut self, count: usize) {
        let end = (1 + count).min(self.messages.len());
        self.messages.drain(1..end);
    }

    /// Check every history invariant; returns the first violation.
    pub fn verify(&self) -> anyhow::Result<()> {
        if self.messages.is_empty() {
            anyhow::bail!("history is empty");
        }
        if self.messages[0].role != Role::User {
            anyhow::bail!("history[0] must be the user goal");
        }
        for i in 1..self.messages.len() {
            let msg = &self.messages[i];
            if msg.role != Role::Function {
                continue;
            }
            let prev = &self.messages[i - 1];
            if prev.role != Role::Model || prev.tool_calls.is_empty() {
                anyhow::bail!("orphan function message at index {i}");
            }
            if prev.tool_calls.len() != msg.tool_results.len() {
                anyhow::bail!(
                    "pairing mismatch at index {i}: {} calls vs {} results",
                    prev.tool_calls.len(),
                    msg.tool_results.len()
                );
            }
            for (k, (call, result)) in
                prev.tool_calls.iter().zip(msg.tool_results.iter()).enumerate()
            {
                if !call.id.is_empty() && !result.id.is_empty() && call.id != result.id {
                    anyhow::bail!(
                        "id mismatch at index {i} position {k}: '{}' vs '{}'",
                        call.id,
                        result.id
                    );
                }
            }
        }
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
