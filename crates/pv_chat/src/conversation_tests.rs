use crate::conversation::{Conversation, ConversationState, Role, FAILURE_NOTICE};
use crate::reasoning::{classify, should_show_response};
use crate::test_utils::{drive, sse_body};
use llm::StreamEvent;

fn started(conversation: &mut Conversation, text: &str) -> u64 {
    conversation
        .submit(text)
        .expect("submission should be accepted")
        .id
}

#[test]
fn test_submit_appends_user_and_placeholder() {
    let mut conversation = Conversation::new();
    let request = conversation.submit("  What is a PV curve?  ").unwrap();

    assert_eq!(request.question, "What is a PV curve?");
    assert_eq!(conversation.state(), ConversationState::Streaming);
    assert_eq!(conversation.in_flight_id(), Some(request.id));

    let messages = conversation.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role(), Role::User);
    assert_eq!(messages[0].raw_text(), "What is a PV curve?");
    assert!(!messages[0].is_streaming());
    assert_eq!(messages[1].role(), Role::Assistant);
    assert_eq!(messages[1].raw_text(), "");
    assert!(messages[1].is_streaming());
}

#[test]
fn test_empty_submission_is_rejected() {
    let mut conversation = Conversation::new();
    assert!(conversation.submit("").is_none());
    assert!(conversation.submit(" \n\t ").is_none());
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.state(), ConversationState::Idle);
}

#[test]
fn test_submit_while_streaming_is_noop() {
    let mut conversation = Conversation::new();
    let id = started(&mut conversation, "first");
    conversation.apply(id, StreamEvent::Chunk("partial".to_string()));

    assert!(conversation.submit("second").is_none());
    assert_eq!(conversation.messages().len(), 2);
    assert_eq!(conversation.messages()[1].raw_text(), "partial");
    assert_eq!(conversation.in_flight_id(), Some(id));
}

#[test]
fn test_chunks_accumulate_and_done_finalizes() {
    let mut conversation = Conversation::new();
    let id = started(&mut conversation, "q");

    assert!(conversation.apply(id, StreamEvent::Chunk("The knee ".to_string())));
    assert!(conversation.apply(id, StreamEvent::Chunk("point".to_string())));
    assert!(conversation.apply(id, StreamEvent::Done));

    let answer = &conversation.messages()[1];
    assert_eq!(answer.raw_text(), "The knee point");
    assert!(!answer.is_streaming());
    assert_eq!(conversation.state(), ConversationState::Idle);
    assert_eq!(conversation.in_flight_id(), None);
}

#[test]
fn test_reasoning_split_across_fragments() {
    let wire = sse_body(&["<thi", "nk>reasoning</think>"]);
    let reference = sse_body(&["<think>reasoning</think>"]);

    let mut expected = Conversation::new();
    let id = started(&mut expected, "why?");
    drive(&mut expected, id, &reference, reference.len());

    for chunk_size in 1..=wire.len() {
        let mut conversation = Conversation::new();
        let id = started(&mut conversation, "why?");
        drive(&mut conversation, id, &wire, chunk_size);

        assert_eq!(conversation.state(), ConversationState::Idle);
        let answer = &conversation.messages()[1];
        let reference_answer = &expected.messages()[1];
        assert_eq!(answer.raw_text(), reference_answer.raw_text(), "size {chunk_size}");
        assert_eq!(answer.is_streaming(), reference_answer.is_streaming());

        let parsed = classify(answer.raw_text());
        assert_eq!(parsed.thinking.as_deref(), Some("reasoning"));
        assert_eq!(parsed.response, "");
    }
}

#[test]
fn test_error_event_replaces_text_with_notice() {
    let mut conversation = Conversation::new();
    let id = started(&mut conversation, "q");
    conversation.apply(id, StreamEvent::Chunk("<think>half".to_string()));
    conversation.apply(id, StreamEvent::Error("model unavailable".to_string()));

    let answer = &conversation.messages()[1];
    assert_eq!(answer.raw_text(), FAILURE_NOTICE);
    assert!(!answer.is_streaming());
    assert!(should_show_response(answer));
    assert_eq!(conversation.state(), ConversationState::Idle);
}

#[test]
fn test_transport_failure_replaces_text_with_notice() {
    let mut conversation = Conversation::new();
    let id = started(&mut conversation, "q");
    conversation.apply(id, StreamEvent::Chunk("partial".to_string()));

    assert!(conversation.transport_failed(id, "connection reset"));
    assert_eq!(conversation.messages()[1].raw_text(), FAILURE_NOTICE);
    assert_eq!(conversation.state(), ConversationState::Idle);

    // Retried only by resubmitting
    let retry = conversation.submit("q").unwrap();
    assert!(retry.id > id);
    assert_eq!(conversation.messages().len(), 4);
}

#[test]
fn test_stream_closed_keeps_received_text() {
    let mut conversation = Conversation::new();
    let id = started(&mut conversation, "q");
    conversation.apply(id, StreamEvent::Chunk("cut sh".to_string()));

    assert!(conversation.stream_closed(id));
    let answer = &conversation.messages()[1];
    assert_eq!(answer.raw_text(), "cut sh");
    assert!(!answer.is_streaming());
    assert_eq!(conversation.state(), ConversationState::Idle);
}

#[test]
fn test_new_chat_mid_stream_is_silent() {
    let mut conversation = Conversation::new();
    let request = conversation.submit("q").unwrap();
    conversation.apply(request.id, StreamEvent::Chunk("<think>step".to_string()));

    conversation.new_chat();

    assert!(request.cancel.is_cancelled());
    assert!(conversation.messages().is_empty());
    assert_eq!(conversation.state(), ConversationState::Idle);

    // The aborted task may still deliver late updates; none of them land
    assert!(!conversation.apply(request.id, StreamEvent::Chunk("late".to_string())));
    assert!(!conversation.transport_failed(request.id, "aborted"));
    assert!(!conversation.stream_closed(request.id));
    assert!(conversation.messages().is_empty());

    // A fresh submission is accepted immediately
    let next = conversation.submit("again").unwrap();
    assert_ne!(next.id, request.id);
    assert_eq!(conversation.messages().len(), 2);
    assert!(!conversation.apply(request.id, StreamEvent::Done));
    assert!(conversation.messages()[1].is_streaming());
}

#[test]
fn test_new_chat_is_idempotent() {
    let mut conversation = Conversation::new();
    conversation.new_chat();
    let request = conversation.submit("q").unwrap();
    conversation.new_chat();
    conversation.new_chat();
    assert!(request.cancel.is_cancelled());
    assert!(conversation.messages().is_empty());
}

#[test]
fn test_events_after_done_are_stale() {
    let mut conversation = Conversation::new();
    let id = started(&mut conversation, "q");
    conversation.apply(id, StreamEvent::Chunk("final".to_string()));
    conversation.apply(id, StreamEvent::Done);

    assert!(!conversation.apply(id, StreamEvent::Chunk(" extra".to_string())));
    assert!(!conversation.apply(id, StreamEvent::Error("late".to_string())));
    assert_eq!(conversation.messages()[1].raw_text(), "final");
}

#[test]
fn test_toggle_reasoning_only_for_assistant_messages() {
    let mut conversation = Conversation::new();
    let id = started(&mut conversation, "q");
    conversation.apply(id, StreamEvent::Chunk("<think>a</think>b".to_string()));
    conversation.apply(id, StreamEvent::Done);

    assert!(!conversation.toggle_reasoning(0));
    assert!(!conversation.is_expanded(0));
    assert!(!conversation.toggle_reasoning(7));

    assert!(conversation.toggle_reasoning(1));
    assert!(conversation.is_expanded(1));
    assert!(conversation.toggle_reasoning(1));
    assert!(!conversation.is_expanded(1));

    conversation.toggle_reasoning(1);
    conversation.new_chat();
    assert!(!conversation.is_expanded(1));
}

#[test]
fn test_single_streaming_message_is_last() {
    let mut conversation = Conversation::new();
    for round in 0..3 {
        let id = started(&mut conversation, &format!("question {round}"));
        conversation.apply(id, StreamEvent::Chunk("answer".to_string()));

        let streaming: Vec<usize> = conversation
            .messages()
            .iter()
            .enumerate()
            .filter(|(_, message)| message.is_streaming())
            .map(|(index, _)| index)
            .collect();
        assert_eq!(streaming, vec![conversation.messages().len() - 1]);

        conversation.apply(id, StreamEvent::Done);
    }
    assert!(conversation.messages().iter().all(|m| !m.is_streaming()));
}
