//! Shared helpers for conversation and rendering tests

use crate::conversation::Conversation;
use llm::SseDecoder;

/// Split `s` into pieces of `chunk_size` characters
pub fn chunk_str(s: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut chunks = Vec::new();

    for chunk in chars.chunks(chunk_size) {
        chunks.push(chunk.iter().collect::<String>());
    }

    chunks
}

/// Build a wire body with one `data: ` line per text delta, followed by `done`
pub fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        let payload = serde_json::json!({ "chunk": delta });
        body.push_str(&format!("data: {payload}\n\n"));
    }
    body.push_str("data: {\"done\": true}\n\n");
    body
}

/// Feed `wire` through a decoder in `chunk_size` pieces and apply every event to request `id`
pub fn drive(conversation: &mut Conversation, id: u64, wire: &str, chunk_size: usize) {
    let mut decoder = SseDecoder::new();
    for piece in chunk_str(wire, chunk_size) {
        for event in decoder.push(piece.as_bytes()) {
            conversation.apply(id, event);
        }
    }
    for event in decoder.finish() {
        conversation.apply(id, event);
    }
}
