//! Streaming transport for the chat service
//!
//! This module implements:
//! - A push-based decoder from raw fragments to `StreamEvent`s (`decoder`)
//! - A chunk-source abstraction over live HTTP responses and recorded playback
//! - The HTTP client that issues one streaming request per question
//! - Recording of streamed sessions for debugging and testing


mod utils;

pub mod client;
pub mod decoder;
pub mod recording;
pub mod streaming;
pub mod types;

pub use client::{BoxedChunkStream, ChatClient};
pub use decoder::{parse_payload, EventReader, SseDecoder};
pub use recording::{APIRecorder, ActiveRecording, PlaybackState, RecordedChunk, RecordingSession};
pub use streaming::{ChunkStream, FragmentStream, HttpChunkStream, PlaybackChunkStream};
pub use types::*;
