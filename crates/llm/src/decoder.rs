//! Server-sent event decoding
//!
//! Event boundaries are newline-delimited `data: ` lines, and the transport is
//! free to split a line (or a multi-byte character) across fragments. The
//! decoder keeps the unterminated tail as raw bytes and only interprets a line
//! once its newline has arrived.

use crate::recording::ActiveRecording;
use crate::streaming::ChunkStream;
use crate::types::{EventPayload, StreamEvent};
use anyhow::Result;
use std::collections::VecDeque;
use tracing::{debug, warn};

const DATA_PREFIX: &str = "data: ";

/// Push-based decoder from raw fragments to stream events
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to contain no newline
    scanned: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment and return the events completed by it
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        self.push_payloads(fragment)
            .iter()
            .filter_map(|data| parse_payload(data))
            .collect()
    }

    /// Flush the buffered tail once the transport has completed
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.finish_payloads()
            .iter()
            .filter_map(|data| parse_payload(data))
            .collect()
    }

    /// Feed one fragment and return the `data: ` payloads of every line it completed
    pub fn push_payloads(&mut self, fragment: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(fragment);

        let mut payloads = Vec::new();
        let mut line_start = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let newline = search_from + offset;
            if let Some(data) = data_of_line(&self.buffer[line_start..newline]) {
                payloads.push(data);
            }
            line_start = newline + 1;
            search_from = line_start;
        }

        // Consumed lines leave the buffer in one move per fragment
        self.buffer.drain(..line_start);
        self.scanned = self.buffer.len();
        payloads
    }

    /// Treat whatever is left in the buffer as a final line
    pub fn finish_payloads(&mut self) -> Vec<String> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.buffer);
        data_of_line(&line).into_iter().collect()
    }

    /// Whether an incomplete line is waiting for more input
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

fn data_of_line(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let Ok(line) = std::str::from_utf8(line) else {
        warn!("Dropping stream line with invalid UTF-8");
        return None;
    };
    line.strip_prefix(DATA_PREFIX).map(str::to_string)
}

/// Interpret the JSON body of a `data: ` line.
///
/// Anything that is not a recognizable payload is transport noise and yields `None`.
pub fn parse_payload(data: &str) -> Option<StreamEvent> {
    match serde_json::from_str::<EventPayload>(data) {
        Ok(payload) => {
            let event = payload.into_event();
            if event.is_none() {
                debug!("Ignoring stream payload without known fields: '{}'", data);
            }
            event
        }
        Err(e) => {
            warn!("Failed to parse stream event '{}': {}", data, e);
            None
        }
    }
}

/// Pull-based reader yielding a lazy, finite sequence of events from a chunk source
pub struct EventReader<S: ChunkStream> {
    source: S,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
    recording: Option<ActiveRecording>,
}

impl<S: ChunkStream> EventReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
            recording: None,
        }
    }

    /// Record every `data: ` payload that passes through this reader.
    ///
    /// The session is saved when the transport completes, or when the reader
    /// is dropped early (after `done`, or on cancellation).
    pub fn with_recording(mut self, recording: ActiveRecording) -> Self {
        self.recording = Some(recording);
        self
    }

    /// Next event, or `None` once the transport has completed and the buffer is drained
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            let payloads = match self.source.next_chunk().await? {
                Some(fragment) => self.decoder.push_payloads(&fragment),
                None => {
                    self.finished = true;
                    self.decoder.finish_payloads()
                }
            };

            for data in payloads {
                if let Some(recording) = self.recording.as_mut() {
                    recording.record_chunk(&data);
                }
                if let Some(event) = parse_payload(&data) {
                    self.pending.push_back(event);
                }
            }

            // The flushed final line is part of the session
            if self.finished {
                if let Some(mut recording) = self.recording.take() {
                    if let Err(e) = recording.finish() {
                        warn!("Failed to save recording: {:#}", e);
                    }
                }
            }
        }
    }

    /// Drain the whole stream, for callers that do not need incremental delivery
    pub async fn collect_events(mut self) -> Result<Vec<StreamEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await? {
            events.push(event);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::FragmentStream;

    const STREAM: &str = concat!(
        "data: {\"chunk\": \"<think>\"}\n",
        "data: {\"chunk\": \"Voltage \\u00e9tude\"}\n",
        ": keep-alive comment\n",
        "\n",
        "data: {\"chunk\": \"</think>Answer\"}\n",
        "data: not json at all\n",
        "data: {\"done\": true}\n",
    );

    fn expected() -> Vec<StreamEvent> {
        vec![
            StreamEvent::Chunk("<think>".to_string()),
            StreamEvent::Chunk("Voltage \u{e9}tude".to_string()),
            StreamEvent::Chunk("</think>Answer".to_string()),
            StreamEvent::Done,
        ]
    }

    fn decode_in_pieces(bytes: &[u8], size: usize) -> Vec<StreamEvent> {
        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for piece in bytes.chunks(size) {
            events.extend(decoder.push(piece));
        }
        events.extend(decoder.finish());
        events
    }

    #[test]
    fn test_unfragmented_stream() {
        assert_eq!(decode_in_pieces(STREAM.as_bytes(), STREAM.len()), expected());
    }

    #[test]
    fn test_any_fragment_size_gives_same_events() {
        let bytes = STREAM.as_bytes();
        for size in 1..=bytes.len() {
            assert_eq!(
                decode_in_pieces(bytes, size),
                expected(),
                "fragment size {size}"
            );
        }
    }

    #[test]
    fn test_multibyte_character_split_across_fragments() {
        let line = "data: {\"chunk\": \"ΔV → 0\"}\n".as_bytes();
        // Split inside the two-byte 'Δ'
        let split = line.iter().position(|b| *b == 0xCE).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        assert!(decoder.has_pending());
        assert_eq!(
            decoder.push(&line[split..]),
            vec![StreamEvent::Chunk("ΔV → 0".to_string())]
        );
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_invalid_utf8_line_is_dropped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"chunk\": \"\xff\"}\ndata: {\"chunk\": \"ok\"}\n");
        assert_eq!(events, vec![StreamEvent::Chunk("ok".to_string())]);
    }

    #[test]
    fn test_one_large_fragment_with_many_lines() {
        let lines = 50_000;
        let body = "data: {\"chunk\": \"abcdefgh\"}\n".repeat(lines);

        let mut decoder = SseDecoder::new();
        let started = std::time::Instant::now();
        let events = decoder.push(body.as_bytes());
        let elapsed = started.elapsed();

        assert_eq!(events.len(), lines);
        assert!(events
            .iter()
            .all(|event| *event == StreamEvent::Chunk("abcdefgh".to_string())));
        assert!(!decoder.has_pending());
        // Linear decoding finishes in milliseconds; rescanning the buffer per line takes seconds
        assert!(elapsed < std::time::Duration::from_secs(2), "took {elapsed:?}");
    }

    #[test]
    fn test_long_line_in_single_bytes() {
        let chunk = "x".repeat(20_000);
        let line = format!("data: {{\"chunk\": \"{chunk}\"}}\n");

        let mut decoder = SseDecoder::new();
        let mut events = Vec::new();
        for byte in line.as_bytes() {
            events.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(events, vec![StreamEvent::Chunk(chunk)]);
    }

    #[test]
    fn test_error_and_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"error\": \"model unavailable\"}\r\n");
        assert_eq!(
            events,
            vec![StreamEvent::Error("model unavailable".to_string())]
        );
    }

    #[test]
    fn test_unterminated_final_line_is_flushed() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"done\": true}").is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::Done]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_truncated_final_line_is_dropped() {
        let mut decoder = SseDecoder::new();
        assert_eq!(
            decoder.push(b"data: {\"chunk\": \"a\"}\ndata: {\"chu"),
            vec![StreamEvent::Chunk("a".to_string())]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_payload_precedence() {
        assert_eq!(
            parse_payload(r#"{"chunk": "x", "error": "boom"}"#),
            Some(StreamEvent::Error("boom".to_string()))
        );
        assert_eq!(
            parse_payload(r#"{"chunk": "x", "done": true}"#),
            Some(StreamEvent::Chunk("x".to_string()))
        );
        assert_eq!(parse_payload(r#"{"done": false}"#), None);
        assert_eq!(parse_payload(r#"{"other": 1}"#), None);
        assert_eq!(parse_payload("[DONE]"), None);
    }

    #[test]
    fn test_lines_without_data_prefix_are_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: message\ndata:{\"chunk\":\"no space\"}\nid: 4\n");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_event_reader_is_lazy_and_finite() {
        let bytes = STREAM.as_bytes();
        let fragments: Vec<Vec<u8>> = bytes.chunks(5).map(|c| c.to_vec()).collect();
        let mut reader = EventReader::new(FragmentStream::new(fragments));

        let mut events = Vec::new();
        while let Some(event) = reader.next_event().await.unwrap() {
            events.push(event);
        }
        assert_eq!(events, expected());

        // Exhausted readers keep returning None
        assert!(reader.next_event().await.unwrap().is_none());
    }
}
