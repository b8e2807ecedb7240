// Copyright (c) 2024-2026 Kodo Contributors
//
// SPDX-License-Identifier: Apache-2.0
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Paragraph};
use ratatui::Frame;

use kodo_core::{StatusPhase, ToolPreview};

use crate::app::{Entry, EntryKind};
use crate::wrap::wrap_line;

pub(crate) fn draw_transcript(frame: &mut Frame, area: Rect, entries: &[Entry]) {
    let block = Block::bordered().title(" kodo ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let width = inner.width.max(1) as usize;
    let height = inner.height as usize;

    // Pre-wrap into display rows and keep the tail that fits.
    let mut rows: Vec<Line> = Vec::new();
    for entry in entries {
        let style = entry_style(entry.kind);
        let prefix = entry_prefix(entry.kind);
        for (i, logical) in entry.text.lines().enumerate() {
            let lead = if i == 0 { prefix } else { "  " };
            for row in wrap_line(&format!("{lead}{logical}"), width) {
                rows.push(Line::from(Span::styled(row, style)));
            }
        }
        if entry.text.is_empty() {
            rows.push(Line::from(Span::styled(prefix.to_string(), style)));
        }
    }
    let start = rows.len().saturating_sub(height);
    let visible: Vec<Line> = rows.split_off(start.min(rows.len()));
    frame.render_widget(Paragraph::new(visible), inner);
}

pub(crate) fn draw_status(frame: &mut Frame, area: Rect, phase: StatusPhase, text: &str, model: &str) {
    let (label, color) = match phase {
        StatusPhase::Thinking => ("thinking", Color::Yellow),
        StatusPhase::Executing => ("executing", Color::Cyan),
        StatusPhase::Blocked => ("blocked", Color::Red),
        StatusPhase::Ready => ("ready", Color::Green),
    };
    let line = Line::from(vec![
        Span::styled(
            format!(" {label} "),
            Style::default().fg(Color::Black).bg(color),
        ),
        Span::raw(format!(" {text}")),
        Span::styled(
            format!("  [{model}]"),
            Style::default().add_modifier(Modifier::DIM),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

pub(crate) fn draw_input(frame: &mut Frame, area: Rect, input: &str, focused: bool) {
    let title = if focused { " input " } else { " input (waiting) " };
    let block = Block::bordered().title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Show the tail of long input.
    let width = inner.width.max(1) as usize;
    let visible: String = {
        let chars: Vec<char> = input.chars().collect();
        let start = chars.len().saturating_sub(width.saturating_sub(1));
        chars[start..].iter().collect()
    };
    let cursor_x = inner.x + visible.chars().count() as u16;
    frame.render_widget(Paragraph::new(visible), inner);
    frame.set_cursor_position((cursor_x, inner.y));
}

pub(crate) fn draw_permission(
    frame: &mut Frame,
    area: Rect,
    prompt: &str,
    preview: Option<&ToolPreview>,
) {
    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            prompt.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for text in preview_lines(preview) {
        lines.push(Line::from(Span::styled(
            text,
            Style::default().fg(Color::Cyan),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::raw(
        "[y] allow    [n] deny    [a] always allow",
    )));

    let height = (lines.len() as u16 + 2).min(area.height);
    let width = area.width.saturating_sub(8).min(80).max(20);
    let overlay = Rect::new(
        area.x + (area.width.saturating_sub(width)) / 2,
        area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    );
    frame.render_widget(Clear, overlay);
    let block = Block::bordered().title(" permission ");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);
    frame.render_widget(Paragraph::new(lines), inner);
}

/// Human-readable preview body for a permission prompt.
pub(crate) fn preview_lines(preview: Option<&ToolPreview>) -> Vec<String> {
    match preview {
        None => vec![],
        Some(ToolPreview::ShellCommand { command }) => {
            vec![format!("$ {}", command.join(" "))]
        }
        Some(ToolPreview::EditOperations { path, operations }) => {
            let mut lines = vec![format!("edit {path} ({} operations)", operations.len())];
            for op in operations.iter().take(3) {
                let old = op
                    .get("old_str")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();
                lines.push(format!("  - replace: {}", first_line_of(old)));
            }
            if operations.len() > 3 {
                lines.push(format!("  ... and {} more", operations.len() - 3));
            }
            lines
        }
    }
}

fn first_line_of(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn entry_style(kind: EntryKind) -> Style {
    match kind {
        EntryKind::User => Style::default().fg(Color::Green),
        EntryKind::Agent => Style::default(),
        EntryKind::Note => Style::default().add_modifier(Modifier::DIM),
        EntryKind::Error => Style::default().fg(Color::Red),
    }
}

fn entry_prefix(kind: EntryKind) -> &'static str {
    match kind {
        EntryKind::User => "› ",
        EntryKind::Agent => "",
        EntryKind::Note => "· ",
        EntryKind::Error => "! ",
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_preview_renders_joined_command() {
        let p = ToolPreview::ShellCommand {
            command: vec!["cargo".into(), "test".into()],
        };
        assert_eq!(preview_lines(Some(&p)), vec!["$ cargo test"]);
    }

    #[test]
    fn edit_preview_caps_at_three_operations() {
        let ops: Vec<serde_json::Value> = (0..5)
            .map(|i| serde_json::json!({"old_str": format!("old{i}"), "new_str": "new"}))
            .collect();
        let p = ToolPreview::EditOperations {
            path: "src/lib.rs".into(),
            operations: ops,
        };
        let lines = preview_lines(Some(&p));
        assert!(lines[0].contains("src/lib.rs"));
        assert!(lines[0].contains("5 operations"));
        assert_eq!(lines.len(), 5); // header + 3 ops + "and 2 more"
        assert!(lines[4].contains("2 more"));
    }

    #[test]
    fn missing_preview_renders_nothing() {
        assert!(preview_lines(None).is_empty());
    }
}
