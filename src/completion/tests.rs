use super::*;
use serde_json::json;

#[test]
fn roles_serialize_lowercase() {
    let message = ChatMessage::system("You are an AI expert on Formula 1.");
    let value = serde_json::to_value(&message).expect("should serialize");
    assert_eq!(
        value,
        json!({ "role": "system", "content": "You are an AI expert on Formula 1." })
    );
}

#[test]
fn messages_ignore_extra_fields() {
    let message: ChatMessage = serde_json::from_value(json!({
        "id": "msg-1",
        "role": "assistant",
        "content": "Max Verstappen.",
        "createdAt": "2024-01-01T00:00:00Z"
    }))
    .expect("should deserialize");

    assert_eq!(message, ChatMessage::assistant("Max Verstappen."));
}

#[test]
fn unknown_role_is_rejected() {
    let result = serde_json::from_value::<ChatMessage>(json!({ "role": "tool", "content": "x" }));
    assert!(result.is_err());

    let result = serde_json::from_value::<ChatMessage>(json!({ "role": "user", "content": 42 }));
    assert!(result.is_err());
}

#[test]
fn constructors_set_roles() {
    assert_eq!(ChatMessage::user("hi").role, Role::User);
    assert_eq!(ChatMessage::assistant("hi").role, Role::Assistant);
    assert_eq!(ChatMessage::system("hi").role, Role::System);
}

#[test]
fn finish_reasons_map_to_stream_names() {
    let cases = [
        ("stop", "stop"),
        ("length", "length"),
        ("content_filter", "content-filter"),
        ("tool_calls", "tool-calls"),
        ("function_call", "tool-calls"),
        ("something_new", "other"),
    ];
    for (openai, expected) in cases {
        assert_eq!(FinishReason::from_openai(openai).as_str(), expected, "{openai}");
    }
    assert_eq!(FinishReason::default(), FinishReason::Stop);
}
