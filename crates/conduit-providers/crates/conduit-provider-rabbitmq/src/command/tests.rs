use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_publish_keeps_message_verbatim() {
    let cmd = QueueCommand::parse(r#"publish orders {"id": 7, "note": "two  spaces"}"#).unwrap();
    assert_eq!(
        cmd,
        QueueCommand::Publish {
            queue: "orders".into(),
            message: r#"{"id": 7, "note": "two  spaces"}"#.into(),
        }
    );
}

#[test]
fn test_publish_without_message() {
    let err = QueueCommand::parse("publish orders").unwrap_err();
    assert!(err.to_string().contains("'publish' requires a message"));
}

#[test]
fn test_queue_argument_required() {
    let err = QueueCommand::parse("count").unwrap_err();
    assert!(err.to_string().contains("'count' requires a queue argument"));
}

#[test]
fn test_simple_commands() {
    assert_eq!(
        QueueCommand::parse("PURGE jobs").unwrap(),
        QueueCommand::Purge { queue: "jobs".into() }
    );
    assert_eq!(QueueCommand::parse("get jobs").unwrap().queue(), "jobs");
}

#[test]
fn test_unknown_command() {
    let err = QueueCommand::parse("bind jobs amq.topic").unwrap_err();
    assert!(err.to_string().contains("unknown command 'bind'"));
}

#[test]
fn test_publish_unquotes_single_quoted_message() {
    let cmd = QueueCommand::parse(r#"publish orders "hello world""#).unwrap();
    assert_eq!(
        cmd,
        QueueCommand::Publish {
            queue: "orders".into(),
            message: "hello world".into(),
        }
    );
}
