use crate::conversation::{Message, Role};
use crate::formatting::{format, NodeKind};
use crate::reasoning::{disclosure_label, should_show_response, ParsedContent, StatusLabel};
use ratatui::prelude::*;

/// Accumulates spans into lines, breaking on embedded newlines
#[derive(Default)]
struct LineBuilder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    prefix: Option<Span<'static>>,
}

impl LineBuilder {
    fn with_prefix(prefix: Span<'static>) -> Self {
        Self {
            prefix: Some(prefix),
            ..Self::default()
        }
    }

    fn push(&mut self, text: &str, style: Style) {
        for (index, piece) in text.split('\n').enumerate() {
            if index > 0 {
                self.end_line();
            }
            if !piece.is_empty() {
                if self.current.is_empty() {
                    if let Some(prefix) = &self.prefix {
                        self.current.push(prefix.clone());
                    }
                }
                self.current.push(Span::styled(piece.to_string(), style));
            }
        }
    }

    fn end_line(&mut self) {
        if self.current.is_empty() {
            if let Some(prefix) = &self.prefix {
                self.current.push(prefix.clone());
            }
        }
        self.lines.push(Line::from(std::mem::take(&mut self.current)));
    }

    /// Start a fresh line unless the current one is still empty
    fn break_line(&mut self) {
        if !self.current.is_empty() {
            self.end_line();
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.current.is_empty() {
            self.end_line();
        }
        self.lines
    }
}

fn render_into(builder: &mut LineBuilder, text: &str, base: Style) {
    for node in format(text) {
        match node.kind {
            NodeKind::Text => builder.push(&node.content, base),
            NodeKind::Bold => builder.push(&node.content, base.add_modifier(Modifier::BOLD)),
            NodeKind::Italic => builder.push(&node.content, base.add_modifier(Modifier::ITALIC)),
            NodeKind::InlineCode => builder.push(&node.content, base.fg(Color::Yellow)),
            NodeKind::InlineMath => builder.push(&node.content, base.fg(Color::Magenta)),
            NodeKind::BlockMath => {
                builder.break_line();
                builder.push(node.content.trim_matches('\n'), base.fg(Color::Magenta));
                builder.break_line();
            }
            NodeKind::CodeBlock { language } => {
                builder.break_line();
                if let Some(language) = language {
                    builder.push(&language, base.fg(Color::DarkGray));
                    builder.end_line();
                }
                builder.push(node.content.trim_end_matches('\n'), base.fg(Color::Cyan));
                builder.break_line();
            }
        }
    }
}

/// Rich-text lines for `text`, whitespace and newlines preserved
pub fn formatted_lines(text: &str, base: Style) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::default();
    render_into(&mut builder, text, base);
    builder.finish()
}

/// Display state of one message beyond its own content
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageView {
    pub expanded: bool,
    pub selected: bool,
    /// Spinner frame shown next to a live status label
    pub spinner: Option<char>,
}

/// All lines for one message: header, reasoning disclosure, answer, trailing gap
pub fn message_lines(
    message: &Message,
    parsed: &ParsedContent,
    view: MessageView,
) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (name, color) = match message.role() {
        Role::User => ("You", Color::Blue),
        Role::Assistant => ("Assistant", Color::Green),
    };
    lines.push(Line::from(vec![
        Span::styled(name, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!("  {}", message.created_at().format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ]));

    if let Some(label) = disclosure_label(message) {
        lines.push(disclosure_line(label, parsed, view));
        if view.expanded {
            if let Some(thinking) = parsed.thinking.as_deref().filter(|t| !t.is_empty()) {
                let base = Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC);
                let mut builder =
                    LineBuilder::with_prefix(Span::styled("│ ", Style::default().fg(Color::DarkGray)));
                render_into(&mut builder, thinking, base);
                lines.extend(builder.finish());
            }
        }
    }

    if should_show_response(message) {
        match message.role() {
            Role::User => lines.extend(formatted_lines(message.raw_text(), Style::default())),
            Role::Assistant => lines.extend(formatted_lines(&parsed.response, Style::default())),
        }
    }

    lines.push(Line::default());
    lines
}

fn disclosure_line(label: StatusLabel, parsed: &ParsedContent, view: MessageView) -> Line<'static> {
    let has_thinking = parsed
        .thinking
        .as_deref()
        .is_some_and(|thinking| !thinking.is_empty());

    let marker = match (has_thinking, view.expanded) {
        (false, _) => "  ",
        (true, false) => "▸ ",
        (true, true) => "▾ ",
    };

    let mut style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::ITALIC);
    if view.selected {
        style = style.add_modifier(Modifier::REVERSED);
    }

    let mut spans = vec![Span::styled(marker, Style::default().fg(Color::DarkGray))];
    if let (Some(frame), false) = (view.spinner, label == StatusLabel::ThoughtProcess) {
        spans.push(Span::styled(format!("{frame} "), Style::default().fg(Color::Blue)));
    }
    spans.push(Span::styled(label.as_str(), style));
    Line::from(spans)
}
