//! Tests for message types.

use super::*;
use chrono::TimeZone;

#[test]
fn test_queue_name_is_not_validated() {
    // Anything the server accepts is acceptable here
    assert_eq!(QueueName::new("orders").as_str(), "orders");
    assert_eq!(QueueName::new("").as_str(), "");
    assert_eq!(QueueName::new("with space/and-slash").as_str(), "with space/and-slash");

    let parsed: QueueName = "double--hyphen".parse().unwrap();
    assert_eq!(parsed.to_string(), "double--hyphen");
}

#[test]
fn test_message_deserializes_from_server_body() {
    let body = r#"{"id":"0194c1e2-7a1b","content":"hello"}"#;
    let message: Message = serde_json::from_str(body).unwrap();

    assert_eq!(message.id(), &MessageId::new("0194c1e2-7a1b"));
    assert_eq!(message.content, "hello");
}

#[test]
fn test_new_message_without_process_after_omits_field() {
    let message = NewMessage::new("payload");
    let json = serde_json::to_value(&message).unwrap();

    assert_eq!(json, serde_json::json!({ "content": "payload" }));
}

#[test]
fn test_new_message_process_after_is_epoch_millis() {
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let message = NewMessage::new("payload").with_process_after(at);
    let json = serde_json::to_value(&message).unwrap();

    assert_eq!(json["processAfter"], serde_json::json!(at.timestamp_millis()));
}

#[test]
fn test_new_message_with_delay_is_in_the_future() {
    let before = Utc::now();
    let message = NewMessage::new("later").with_delay(Duration::minutes(10));

    let at = message.process_after.expect("delay sets process_after");
    assert!(at >= before + Duration::minutes(10));
}

#[test]
fn test_queued_production_pairs_message_and_queue() {
    let production = QueuedProduction::new(NewMessage::new("x"), "billing");

    assert_eq!(production.queue, QueueName::new("billing"));
    assert_eq!(production.message.content, "x");
}
