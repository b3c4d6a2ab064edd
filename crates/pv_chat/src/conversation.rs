//! Conversation state machine
//!
//! The `Conversation` owns every message and the single in-flight request.
//! All mutation goes through its transition methods; the classifier, the
//! formatter and the render layer only ever read.

use chrono::{DateTime, Utc};
use llm::StreamEvent;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Text that replaces an assistant message whose request failed
pub const FAILURE_NOTICE: &str = "Sorry, there was an error processing your request.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One conversation entry
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    role: Role,
    raw_text: String,
    is_streaming: bool,
    created_at: DateTime<Utc>,
}

impl Message {
    /// A finalized user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            raw_text: text.into(),
            is_streaming: false,
            created_at: Utc::now(),
        }
    }

    /// An empty assistant message that is still receiving text
    pub fn assistant_placeholder() -> Self {
        Self {
            role: Role::Assistant,
            raw_text: String::new(),
            is_streaming: true,
            created_at: Utc::now(),
        }
    }

    #[cfg(test)]
    pub(crate) fn assistant_with(raw_text: &str, is_streaming: bool) -> Self {
        Self {
            role: Role::Assistant,
            raw_text: raw_text.to_string(),
            is_streaming,
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// No request in flight, ready to submit
    Idle,
    /// The trailing assistant message is receiving text
    Streaming,
}

/// Everything the request driver needs to issue an accepted submission
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub id: u64,
    pub question: String,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    cancel: CancellationToken,
}

/// Ordered messages plus the single in-flight request
#[derive(Debug, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    /// Indices of assistant messages whose reasoning panel is open
    expanded: BTreeSet<usize>,
    in_flight: Option<InFlight>,
    next_request_id: u64,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> ConversationState {
        if self.in_flight.is_some() {
            ConversationState::Streaming
        } else {
            ConversationState::Idle
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.state() == ConversationState::Streaming
    }

    pub fn in_flight_id(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|request| request.id)
    }

    /// Start a new exchange with `text`.
    ///
    /// Returns `None` without touching any state when the trimmed text is empty
    /// or another request is still streaming.
    pub fn submit(&mut self, text: &str) -> Option<PendingRequest> {
        let question = text.trim();
        if question.is_empty() {
            debug!("Ignoring empty submission");
            return None;
        }
        if self.in_flight.is_some() {
            debug!("Ignoring submission while a request is streaming");
            return None;
        }

        self.next_request_id += 1;
        let id = self.next_request_id;
        let cancel = CancellationToken::new();

        self.messages.push(Message::user(question));
        self.messages.push(Message::assistant_placeholder());
        self.in_flight = Some(InFlight {
            id,
            cancel: cancel.clone(),
        });

        info!("Starting request {}", id);
        Some(PendingRequest {
            id,
            question: question.to_string(),
            cancel,
        })
    }

    /// Apply one decoded event belonging to request `id`.
    ///
    /// Returns false if the event was stale and therefore discarded.
    pub fn apply(&mut self, id: u64, event: StreamEvent) -> bool {
        if !self.is_current(id) {
            debug!("Discarding event for stale request {}: {:?}", id, event);
            return false;
        }

        match event {
            StreamEvent::Chunk(delta) => {
                if let Some(message) = self.streaming_message_mut() {
                    message.raw_text.push_str(&delta);
                }
            }
            StreamEvent::Done => {
                debug!("Request {} completed", id);
                self.finalize(None);
            }
            StreamEvent::Error(message) => {
                warn!("Request {} reported an error: {}", id, message);
                self.finalize(Some(FAILURE_NOTICE));
            }
        }
        true
    }

    /// The transport for request `id` failed before the answer completed
    pub fn transport_failed(&mut self, id: u64, reason: &str) -> bool {
        if !self.is_current(id) {
            debug!("Ignoring failure of stale request {}: {}", id, reason);
            return false;
        }
        warn!("Request {} failed: {}", id, reason);
        self.finalize(Some(FAILURE_NOTICE));
        true
    }

    /// The transport for request `id` ended without a completion event.
    ///
    /// Whatever text arrived is kept as the final answer.
    pub fn stream_closed(&mut self, id: u64) -> bool {
        if !self.is_current(id) {
            return false;
        }
        debug!("Request {} closed without a done event", id);
        self.finalize(None);
        true
    }

    /// Abort any in-flight request and forget the whole conversation.
    ///
    /// Never produces a failure notice. Calling it repeatedly is harmless.
    pub fn new_chat(&mut self) {
        if let Some(request) = self.in_flight.take() {
            info!("Cancelling request {} for a new chat", request.id);
            request.cancel.cancel();
        }
        self.messages.clear();
        self.expanded.clear();
    }

    /// Open or close the reasoning panel of the assistant message at `index`
    pub fn toggle_reasoning(&mut self, index: usize) -> bool {
        match self.messages.get(index) {
            Some(message) if message.role == Role::Assistant => {
                if !self.expanded.remove(&index) {
                    self.expanded.insert(index);
                }
                true
            }
            _ => false,
        }
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.contains(&index)
    }

    fn is_current(&self, id: u64) -> bool {
        self.in_flight_id() == Some(id)
    }

    fn streaming_message_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut().filter(|message| message.is_streaming)
    }

    /// Close out the trailing message, optionally replacing its text, and go Idle
    fn finalize(&mut self, replacement: Option<&str>) {
        if let Some(message) = self.streaming_message_mut() {
            if let Some(text) = replacement {
                message.raw_text = text.to_string();
            }
            message.is_streaming = false;
        }
        self.in_flight = None;
    }
}
