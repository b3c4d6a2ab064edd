use serde::{Deserialize, Serialize};

/// One decoded unit from the inbound event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text delta to append to the answer
    Chunk(String),
    /// The service finished the answer
    Done,
    /// The service reported a failure
    Error(String),
}

/// Body of the outbound streaming request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub question: String,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// Payload of a single `data: ` line.
///
/// Exactly one field is expected to be present. When a producer sends more than
/// one, `error` wins over `chunk`, which wins over `done`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct EventPayload {
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EventPayload {
    pub(crate) fn into_event(self) -> Option<StreamEvent> {
        if let Some(message) = self.error {
            return Some(StreamEvent::Error(message));
        }
        if let Some(text) = self.chunk {
            return Some(StreamEvent::Chunk(text));
        }
        match self.done {
            Some(true) => Some(StreamEvent::Done),
            _ => None,
        }
    }
}

/// Errors raised by the transport before or while streaming
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Stream stalled for {0} seconds")]
    Stalled(u64),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
