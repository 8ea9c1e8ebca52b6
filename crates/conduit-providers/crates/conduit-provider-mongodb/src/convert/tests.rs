use super::*;
use bson::oid::ObjectId;
use conduit_core::mongo_script::parse_literal;
use pretty_assertions::assert_eq;

#[test]
fn test_shell_literal_becomes_typed_document() {
    let literal = parse_literal(
        r#"{_id: ObjectId("65a1b2c3d4e5f60718293a4b"), n: NumberLong(42), tags: ['a', 'b']}"#,
    )
    .unwrap();
    let doc = json_to_document(literal).unwrap();

    assert_eq!(
        doc.get_object_id("_id").unwrap(),
        ObjectId::parse_str("65a1b2c3d4e5f60718293a4b").unwrap()
    );
    assert_eq!(doc.get_i64("n").unwrap(), 42);
    assert_eq!(doc.get_array("tags").unwrap().len(), 2);
}

#[test]
fn test_iso_date_literal() {
    let literal = parse_literal(r#"{at: ISODate("2024-01-02T03:04:05Z")}"#).unwrap();
    let doc = json_to_document(literal).unwrap();
    assert!(doc.get_datetime("at").is_ok());
}

#[test]
fn test_non_document_rejected() {
    let err = json_to_document(serde_json::json!([1, 2])).unwrap_err();
    assert!(err.to_string().contains("Expected a document, got Array"));
}

#[test]
fn test_documents_from_array() {
    let docs = json_to_documents(serde_json::json!([{"a": 1}, {"a": 2}])).unwrap();
    assert_eq!(docs.len(), 2);
    assert!(json_to_documents(serde_json::json!({"a": 1})).is_err());
}

#[test]
fn test_result_document_round_trips_to_relaxed_json() {
    let doc = bson::doc! { "a": 1, "name": "x" };
    assert_eq!(
        document_to_json(doc),
        serde_json::json!({ "a": 1, "name": "x" })
    );
}
