use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_keeps_column_order_and_types() {
    let body = br#"["zeta","alpha","price","tags"]
["UInt64","Nullable(String)","Decimal(10, 2)","Array(String)"]
["18446744073709551615","a",12.50,["x","y"]]
["1",null,0.1,[]]
"#;
    let result = parse_compact_rows(body).unwrap();
    let names: Vec<&str> = result.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "price", "tags"]);
    assert_eq!(result.columns[2].data_type, "Decimal(10, 2)");

    assert_eq!(result.cell(0, "zeta"), Some(&Value::UInt64(u64::MAX)));
    assert_eq!(result.cell(0, "alpha"), Some(&Value::String("a".into())));
    assert_eq!(result.cell(0, "price"), Some(&Value::Decimal("12.5".into())));
    assert_eq!(
        result.cell(0, "tags"),
        Some(&Value::Json(serde_json::json!(["x", "y"])))
    );
    assert_eq!(result.cell(1, "alpha"), Some(&Value::Null));
}

#[test]
fn test_empty_result_still_has_columns() {
    let body = b"[\"id\"]\n[\"Int32\"]\n";
    let result = parse_compact_rows(body).unwrap();
    assert_eq!(result.columns.len(), 1);
    assert!(result.rows.is_empty());
}

#[test]
fn test_dates_and_uuids() {
    let body = br#"["d","ts","u"]
["Date","DateTime('UTC')","UUID"]
["2024-03-01","2024-03-01 10:20:30","67e55044-10b1-426f-9247-bb680e5fe0c8"]
"#;
    let result = parse_compact_rows(body).unwrap();
    assert_eq!(
        result.cell(0, "d"),
        Some(&Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()))
    );
    assert!(matches!(result.cell(0, "ts"), Some(Value::DateTime(_))));
    assert!(matches!(result.cell(0, "u"), Some(Value::Uuid(_))));
}

#[test]
fn test_low_cardinality_nullable_unwraps() {
    assert_eq!(base_type("LowCardinality(Nullable(String))"), "String");
    assert_eq!(base_type("Nullable(Int8)"), "Int8");
}

#[test]
fn test_mismatched_header_is_error() {
    let body = b"[\"a\",\"b\"]\n[\"Int32\"]\n";
    assert!(parse_compact_rows(body).is_err());
}

#[test]
fn test_empty_body() {
    assert!(parse_compact_rows(b"").unwrap().columns.is_empty());
}
