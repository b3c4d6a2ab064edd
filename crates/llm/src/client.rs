use crate::decoder::EventReader;
use crate::recording::{APIRecorder, PlaybackState};
use crate::streaming::{ChunkStream, HttpChunkStream, PlaybackChunkStream};
use crate::types::{ApiError, ChatRequest};
use crate::utils;
use anyhow::Result;
use reqwest::Client;
use tracing::debug;

/// Boxed chunk source so live and recorded streams share one reader type
pub type BoxedChunkStream = Box<dyn ChunkStream>;

#[async_trait::async_trait]
impl ChunkStream for BoxedChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).next_chunk().await
    }
}

/// Where answers come from
#[derive(Clone)]
enum Backend {
    Http {
        client: Client,
        endpoint: String,
        recorder: Option<APIRecorder>,
    },
    Playback(PlaybackState),
}

/// Issues one streaming request per question
#[derive(Clone)]
pub struct ChatClient {
    backend: Backend,
}

impl ChatClient {
    pub fn default_endpoint() -> String {
        "http://localhost:5000/api/chat/stream".to_string()
    }

    pub fn new(endpoint: String) -> Self {
        Self {
            backend: Backend::Http {
                client: Client::new(),
                endpoint,
                recorder: None,
            },
        }
    }

    /// Record every streamed session into `recorder`'s file
    pub fn new_with_recorder(endpoint: String, recorder: APIRecorder) -> Self {
        Self {
            backend: Backend::Http {
                client: Client::new(),
                endpoint,
                recorder: Some(recorder),
            },
        }
    }

    /// Serve answers from a recording instead of the network
    pub fn from_playback(playback: PlaybackState) -> Self {
        Self {
            backend: Backend::Playback(playback),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match &self.backend {
            Backend::Http { endpoint, .. } => Some(endpoint),
            Backend::Playback(_) => None,
        }
    }

    /// Send the question and return a reader over the answer's events.
    ///
    /// Fails if the request cannot be sent or the service answers with an error status.
    pub async fn stream(&self, question: &str) -> Result<EventReader<BoxedChunkStream>> {
        let request = ChatRequest::new(question);

        match &self.backend {
            Backend::Http {
                client,
                endpoint,
                recorder,
            } => {
                debug!("Sending streaming request to {}", endpoint);

                let response = client
                    .post(endpoint.as_str())
                    .header("Accept", "text/event-stream")
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| ApiError::NetworkError(e.to_string()))?;

                let response = utils::check_response_error(response).await?;
                let source: BoxedChunkStream = Box::new(HttpChunkStream::new(response));
                let reader = EventReader::new(source);

                match recorder {
                    Some(recorder) => {
                        let recording = recorder.start_recording(serde_json::to_value(&request)?);
                        Ok(reader.with_recording(recording))
                    }
                    None => Ok(reader),
                }
            }
            Backend::Playback(playback) => {
                let session = playback.next_session()?.ok_or_else(|| {
                    ApiError::Unknown("No more recorded sessions to play back".to_string())
                })?;
                debug!(
                    "Playing back recorded session with {} chunks",
                    session.chunks.len()
                );
                let source: BoxedChunkStream =
                    Box::new(PlaybackChunkStream::new(session.chunks, playback.fast));
                Ok(EventReader::new(source))
            }
        }
    }
}
