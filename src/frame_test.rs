use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("topic:subscribe", Data::new());
    assert_eq!(frame.syscall, "topic:subscribe");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.topic.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let req = Frame::request("chat:send", Data::new()).with_topic("chat:0771234567");
    let item = req.item(Data::new());

    assert_eq!(item.parent_id, Some(req.id));
    assert_eq!(item.topic.as_deref(), Some("chat:0771234567"));
    assert_eq!(item.syscall, "chat:send");
    assert_eq!(item.status, Status::Item);
}

#[test]
fn done_with_carries_payload() {
    let req = Frame::request("topic:subscribe", Data::new());
    let mut data = Data::new();
    data.insert("topic".into(), serde_json::json!("orders"));
    let done = req.done_with(data);

    assert_eq!(done.status, Status::Done);
    assert_eq!(done.str_field("topic"), Some("orders"));
}

#[test]
fn terminal_statuses() {
    assert!(Status::Done.is_terminal());
    assert!(Status::Error.is_terminal());
    assert!(Status::Cancel.is_terminal());
    assert!(!Status::Request.is_terminal());
    assert!(!Status::Item.is_terminal());
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("topic:subscribe", Data::new());
    assert_eq!(frame.prefix(), "topic");
    assert_eq!(frame.op(), "subscribe");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn parses_minimal_client_frame() {
    let json = format!(
        r#"{{"id":"{}","parent_id":null,"ts":1,"syscall":"topic:subscribe","status":"request","data":{{"topic":"orders"}}}}"#,
        Uuid::new_v4()
    );
    let frame: Frame = serde_json::from_str(&json).expect("parse");
    assert_eq!(frame.syscall, "topic:subscribe");
    assert!(frame.from.is_none());
    assert_eq!(frame.str_field("topic"), Some("orders"));
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("insufficient stock")]
    struct OutOfStock;

    impl ErrorCode for OutOfStock {
        fn error_code(&self) -> &'static str {
            "E_INSUFFICIENT_STOCK"
        }
    }

    let req = Frame::request("billing:complete", Data::new());
    let err = req.error_from(&OutOfStock);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.str_field("code"), Some("E_INSUFFICIENT_STOCK"));
    assert_eq!(err.str_field("message"), Some("insufficient stock"));
    assert_eq!(
        err.data
            .get("retryable")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}

#[test]
fn to_data_flattens_objects() {
    #[derive(serde::Serialize)]
    struct Payload {
        phone: String,
        unread: bool,
    }

    let data = to_data(&Payload { phone: "0771234567".into(), unread: true });
    assert_eq!(data.get("phone").and_then(|v| v.as_str()), Some("0771234567"));
    assert_eq!(data.get("unread").and_then(serde_json::Value::as_bool), Some(true));
}

#[test]
fn to_data_wraps_scalars() {
    let data = to_data(&7);
    assert_eq!(data.get("value").and_then(serde_json::Value::as_i64), Some(7));
}
