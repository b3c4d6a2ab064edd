//! Chunk sources for streamed answers
//!
//! A `ChunkStream` hands out raw byte fragments exactly as the transport
//! delivered them. Live HTTP responses and recorded playback share this
//! interface so the decoder sees identical input in both cases.

use crate::recording::RecordedChunk;
use crate::types::ApiError;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Response;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Source of raw fragments; `Ok(None)` means the transport completed
#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

/// Body of a live HTTP response, one fragment per network read
pub struct HttpChunkStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
}

impl HttpChunkStream {
    pub fn new(response: Response) -> Self {
        Self {
            body: response
                .bytes_stream()
                .map(|read| read.map(|bytes| bytes.to_vec()))
                .boxed(),
        }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.body.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => {
                Err(ApiError::NetworkError(format!("Response body broke off: {e}")).into())
            }
            None => Ok(None),
        }
    }
}

/// How recorded fragments are spaced out during playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pacing {
    /// Reproduce the offsets captured while recording
    Recorded,
    /// One fragment per interval, regardless of the recording
    Fixed(Duration),
}

/// Fast playback still paces at ~60fps so incremental rendering stays visible
const FAST_INTERVAL: Duration = Duration::from_millis(17);

/// Replays a recorded session as the SSE bytes the service originally sent.
///
/// Payloads captured within the same millisecond arrived in one network read
/// and are replayed as one fragment.
pub struct PlaybackChunkStream {
    fragments: VecDeque<(Duration, Vec<u8>)>,
    pacing: Pacing,
    started: Instant,
}

impl PlaybackChunkStream {
    pub fn new(chunks: Vec<RecordedChunk>, fast_mode: bool) -> Self {
        let mut fragments: VecDeque<(Duration, Vec<u8>)> = VecDeque::new();
        for chunk in chunks {
            let offset = Duration::from_millis(chunk.timestamp_ms);
            let line = format!("data: {}\n", chunk.data).into_bytes();
            match fragments.back_mut() {
                Some((last_offset, bytes)) if *last_offset == offset => {
                    bytes.extend_from_slice(&line)
                }
                _ => fragments.push_back((offset, line)),
            }
        }

        Self {
            fragments,
            pacing: if fast_mode {
                Pacing::Fixed(FAST_INTERVAL)
            } else {
                Pacing::Recorded
            },
            started: Instant::now(),
        }
    }
}

#[async_trait]
impl ChunkStream for PlaybackChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some((offset, bytes)) = self.fragments.pop_front() else {
            return Ok(None);
        };
        match self.pacing {
            Pacing::Recorded => tokio::time::sleep_until(self.started + offset).await,
            Pacing::Fixed(interval) => tokio::time::sleep(interval).await,
        }
        Ok(Some(bytes))
    }
}

/// In-memory fragments, delivered in order without delay
pub struct FragmentStream {
    fragments: VecDeque<Vec<u8>>,
}

impl FragmentStream {
    pub fn new<I, B>(fragments: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl ChunkStream for FragmentStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.fragments.pop_front())
    }
}
