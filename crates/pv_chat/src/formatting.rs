//! Inline rich-text tokenizer
//!
//! Every pattern family is scanned independently over the whole text. The
//! candidate matches are then resolved by interval scheduling: sorted by start
//! offset (family priority breaks ties) and kept greedily when they do not
//! overlap the previously kept match. Whatever lies between kept matches is
//! plain text, copied verbatim.
//!
//! The same function formats finished and still-streaming text. An
//! unterminated delimiter simply produces no match and stays plain text.

use regex::{Captures, Regex};
use std::ops::Range;
use std::sync::OnceLock;

/// Rendering intent of a formatted span
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Bold,
    Italic,
    InlineCode,
    CodeBlock { language: Option<String> },
    InlineMath,
    BlockMath,
}

/// One classified span of the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedNode {
    pub kind: NodeKind,
    /// Text to display, without delimiters
    pub content: String,
    /// Byte range of the source this node was produced from, delimiters included
    pub span: Range<usize>,
}

impl FormattedNode {
    pub fn text(content: &str, span: Range<usize>) -> Self {
        Self {
            kind: NodeKind::Text,
            content: content.to_string(),
            span,
        }
    }
}

struct Pattern {
    regex: Regex,
    build: fn(&Captures) -> (NodeKind, String),
}

fn group(caps: &Captures, index: usize) -> String {
    caps.get(index)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Pattern families in tie-break priority order
fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let compile = |pattern: &str| Regex::new(pattern).expect("valid formatting pattern");
        vec![
            Pattern {
                regex: compile(r"(?s)\\\[(.+?)\\\]"),
                build: |caps| (NodeKind::BlockMath, group(caps, 1)),
            },
            Pattern {
                regex: compile(r"\\\((.+?)\\\)"),
                build: |caps| (NodeKind::InlineMath, group(caps, 1)),
            },
            Pattern {
                regex: compile(r"\*\*(.+?)\*\*"),
                build: |caps| (NodeKind::Bold, group(caps, 1)),
            },
            Pattern {
                regex: compile(r"\*([^*\n]+)\*"),
                build: |caps| (NodeKind::Italic, group(caps, 1)),
            },
            Pattern {
                regex: compile(r"(?s)```(?:([A-Za-z0-9_+.#-]*)[ \t]*\n)?(.*?)```"),
                build: |caps| {
                    let language = caps
                        .get(1)
                        .map(|m| m.as_str())
                        .filter(|lang| !lang.is_empty())
                        .map(str::to_string);
                    (NodeKind::CodeBlock { language }, group(caps, 2))
                },
            },
            Pattern {
                regex: compile(r"`([^`\n]+)`"),
                build: |caps| (NodeKind::InlineCode, group(caps, 1)),
            },
        ]
    })
}

struct Candidate {
    span: Range<usize>,
    priority: usize,
    kind: NodeKind,
    content: String,
}

fn collect_candidates(text: &str) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for (priority, pattern) in patterns().iter().enumerate() {
        for caps in pattern.regex.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            let (kind, content) = (pattern.build)(&caps);
            candidates.push(Candidate {
                span: whole.range(),
                priority,
                kind,
                content,
            });
        }
    }
    candidates.sort_by_key(|c| (c.span.start, c.priority));
    candidates
}

/// Split `text` into an ordered sequence of formatted nodes.
///
/// The spans of the returned nodes tile `text` exactly. An empty input yields no nodes.
pub fn format(text: &str) -> Vec<FormattedNode> {
    let mut nodes = Vec::new();
    let mut cursor = 0;

    for candidate in collect_candidates(text) {
        if candidate.span.start < cursor {
            continue;
        }
        if candidate.span.start > cursor {
            nodes.push(FormattedNode::text(
                &text[cursor..candidate.span.start],
                cursor..candidate.span.start,
            ));
        }
        cursor = candidate.span.end;
        nodes.push(FormattedNode {
            kind: candidate.kind,
            content: candidate.content,
            span: candidate.span,
        });
    }

    if cursor < text.len() {
        nodes.push(FormattedNode::text(&text[cursor..], cursor..text.len()));
    }

    nodes
}
