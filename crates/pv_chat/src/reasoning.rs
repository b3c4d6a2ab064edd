//! Separates the reasoning segment from the visible answer
//!
//! Everything here is derived from a message's raw text on demand. Nothing is
//! stored, so a re-render after every fragment always agrees with the text that
//! has arrived so far.

use crate::conversation::{Message, Role};

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// Thinking/response split of one message's raw text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedContent {
    pub thinking: Option<String>,
    pub response: String,
}

/// Classify raw message text into reasoning and answer
pub fn classify(raw: &str) -> ParsedContent {
    let Some(open) = raw.find(THINK_OPEN) else {
        return ParsedContent {
            thinking: None,
            response: raw.to_string(),
        };
    };

    let inner_start = open + THINK_OPEN.len();
    match raw[inner_start..].find(THINK_CLOSE) {
        Some(close_offset) => {
            let close = inner_start + close_offset;
            let span_end = close + THINK_CLOSE.len();
            let mut response = String::with_capacity(raw.len() - (span_end - open));
            response.push_str(&raw[..open]);
            response.push_str(&raw[span_end..]);

            ParsedContent {
                thinking: Some(raw[inner_start..close].trim().to_string()),
                response: response.trim().to_string(),
            }
        }
        None => ParsedContent {
            thinking: Some(raw[inner_start..].trim().to_string()),
            response: String::new(),
        },
    }
}

/// Progress label shown for a streaming message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Processing,
    Thinking,
    ThoughtProcess,
}

impl StatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusLabel::Processing => "Processing…",
            StatusLabel::Thinking => "Thinking…",
            StatusLabel::ThoughtProcess => "Click here to see the thought process",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived flags for a partially received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub has_text: bool,
    pub thinking_started: bool,
    pub thinking_complete: bool,
    pub label: StatusLabel,
}

impl StreamStatus {
    pub fn of(raw: &str) -> Self {
        let has_text = !raw.is_empty();
        let open = raw.find(THINK_OPEN);
        let thinking_started = open.is_some();
        let thinking_complete = open
            .map(|open| raw[open + THINK_OPEN.len()..].contains(THINK_CLOSE))
            .unwrap_or(false);

        let label = if !has_text {
            StatusLabel::Processing
        } else if thinking_complete {
            StatusLabel::ThoughtProcess
        } else if thinking_started {
            let captured = classify(raw)
                .thinking
                .map(|thinking| !thinking.is_empty())
                .unwrap_or(false);
            if captured {
                StatusLabel::Thinking
            } else {
                StatusLabel::Processing
            }
        } else {
            // Plain answer without reasoning; the render layer shows the text itself
            StatusLabel::Processing
        };

        Self {
            has_text,
            thinking_started,
            thinking_complete,
            label,
        }
    }
}

/// Whether the answer container of `message` should be rendered at all
pub fn should_show_response(message: &Message) -> bool {
    if message.role() == Role::User || !message.is_streaming() {
        return true;
    }
    let status = StreamStatus::of(message.raw_text());
    if !status.has_text {
        return false;
    }
    !status.thinking_started || status.thinking_complete
}

/// Label for the reasoning disclosure of `message`, if it has a reasoning segment
pub fn disclosure_label(message: &Message) -> Option<StatusLabel> {
    if message.role() != Role::Assistant {
        return None;
    }
    if message.is_streaming() {
        let status = StreamStatus::of(message.raw_text());
        if status.thinking_started || !status.has_text {
            return Some(status.label);
        }
        return None;
    }
    classify(message.raw_text())
        .thinking
        .map(|_| StatusLabel::ThoughtProcess)
}

/// Memo of the last classification, keyed strictly by `(raw_text, is_streaming)`
#[derive(Debug, Default)]
pub struct ParseCache {
    key: Option<(String, bool)>,
    parsed: ParsedContent,
}

impl ParseCache {
    pub fn get(&mut self, raw: &str, is_streaming: bool) -> &ParsedContent {
        let hit = matches!(&self.key, Some((cached, streaming)) if cached == raw && *streaming == is_streaming);
        if !hit {
            self.parsed = classify(raw);
            self.key = Some((raw.to_string(), is_streaming));
        }
        &self.parsed
    }
}
