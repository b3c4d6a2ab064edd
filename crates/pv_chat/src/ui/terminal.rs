//! Line-oriented output for `pv-chat ask`

use crate::conversation::{Conversation, Message, FAILURE_NOTICE};
use crate::reasoning::{classify, should_show_response, THINK_CLOSE, THINK_OPEN};
use crate::ui::backend::{apply_update, spawn_request, update_channel, RequestUpdate};
use anyhow::{anyhow, bail, Context, Result};
use crossterm::style::Stylize;
use llm::{ChatClient, StreamEvent};
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

/// Prints an answer incrementally as its raw text grows
#[derive(Debug, Default)]
pub struct AnswerPrinter {
    thinking_printed: String,
    response_printed: String,
}

impl AnswerPrinter {
    /// Write whatever part of `message` has not been printed yet
    pub fn update<W: Write>(&mut self, message: &Message, out: &mut W) -> io::Result<()> {
        let parsed = classify(message.raw_text());
        let streaming = message.is_streaming();

        if let Some(thinking) = &parsed.thinking {
            let visible = if streaming {
                without_partial_marker(thinking, THINK_CLOSE).trim_end()
            } else {
                thinking.as_str()
            };
            if let Some(delta) = visible.strip_prefix(self.thinking_printed.as_str()) {
                if !delta.is_empty() {
                    if self.thinking_printed.is_empty() {
                        write!(out, "{}", "Reasoning: ".dim())?;
                    }
                    write!(out, "{}", delta.dim())?;
                    self.thinking_printed.push_str(delta);
                }
            }
        }

        if should_show_response(message) {
            let visible = if streaming {
                without_partial_marker(&parsed.response, THINK_OPEN)
            } else {
                parsed.response.as_str()
            };
            match visible.strip_prefix(self.response_printed.as_str()) {
                Some("") => {}
                Some(delta) => {
                    if self.response_printed.is_empty() && !self.thinking_printed.is_empty() {
                        write!(out, "\n\n")?;
                    }
                    write!(out, "{delta}")?;
                    self.response_printed.push_str(delta);
                }
                None => {
                    // A marker arriving later reclassified text that was already printed
                    debug!("Response diverged from printed text, reprinting");
                    write!(out, "\n\n{visible}")?;
                    self.response_printed = visible.to_string();
                }
            }
        }

        out.flush()
    }

    pub fn finish<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if !self.thinking_printed.is_empty() || !self.response_printed.is_empty() {
            writeln!(out)?;
        }
        out.flush()
    }
}

/// `text` without a trailing partial `marker`, which may still complete
fn without_partial_marker<'a>(text: &'a str, marker: &str) -> &'a str {
    for len in (1..marker.len()).rev() {
        if text.ends_with(&marker[..len]) {
            return &text[..text.len() - len];
        }
    }
    text
}

/// Stream the answer to `question` to stdout.
///
/// Fails when the request fails; Ctrl+C cancels quietly.
pub async fn run_ask(
    client: ChatClient,
    question: &str,
    stall_timeout: Option<Duration>,
) -> Result<()> {
    let mut conversation = Conversation::new();
    let request = conversation
        .submit(question)
        .ok_or_else(|| anyhow!("Question is empty"))?;

    let (updates_tx, mut updates_rx) = update_channel();
    let task = spawn_request(client, request, stall_timeout, updates_tx);

    let mut printer = AnswerPrinter::default();
    let mut failure = None;

    while conversation.is_streaming() {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted, cancelling request");
                conversation.new_chat();
            }
            update = updates_rx.recv() => {
                let Some((id, update)) = update else { break };
                match &update {
                    RequestUpdate::TransportError(reason) => failure = Some(reason.clone()),
                    RequestUpdate::Event(StreamEvent::Error(message)) => {
                        failure = Some(message.clone())
                    }
                    _ => {}
                }
                apply_update(&mut conversation, id, update);
                if failure.is_none() {
                    if let Some(message) = conversation.messages().last() {
                        printer.update(message, &mut io::stdout())?;
                    }
                }
            }
        }
    }

    task.await.context("Request task panicked")?;
    printer.finish(&mut io::stdout())?;

    if let Some(reason) = failure {
        eprintln!("{FAILURE_NOTICE}");
        bail!("Request failed: {reason}");
    }
    Ok(())
}
