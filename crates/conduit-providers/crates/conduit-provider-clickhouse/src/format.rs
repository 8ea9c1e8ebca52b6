//! `JSONCompactEachRowWithNamesAndTypes` decoding

use chrono::{NaiveDate, NaiveDateTime};
use conduit_core::{ColumnMeta, ConduitError, QueryResult, Result, Row, Value};

#[cfg(test)]
mod tests;

pub(crate) const ROW_FORMAT: &str = "JSONCompactEachRowWithNamesAndTypes";

/// Decode a names line, a types line, then one JSON array per row
pub fn parse_compact_rows(body: &[u8]) -> Result<QueryResult> {
    let text = String::from_utf8_lossy(body);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let (Some(names), Some(types)) = (lines.next(), lines.next()) else {
        return Ok(QueryResult::empty());
    };
    let names: Vec<String> = serde_json::from_str(names)?;
    let types: Vec<String> = serde_json::from_str(types)?;
    if names.len() != types.len() {
        return Err(ConduitError::Exec(format!(
            "ClickHouse returned {} column names but {} types",
            names.len(),
            types.len()
        )));
    }

    let columns = names
        .iter()
        .zip(&types)
        .enumerate()
        .map(|(idx, (name, ty))| ColumnMeta::new(name, ty, idx))
        .collect();

    let mut rows = Vec::new();
    for line in lines {
        let cells: Vec<serde_json::Value> = serde_json::from_str(line)?;
        rows.push(Row::new(
            cells
                .into_iter()
                .zip(&types)
                .map(|(cell, ty)| cell_to_value(cell, ty))
                .collect(),
        ));
    }

    Ok(QueryResult {
        columns,
        rows,
        affected_rows: 0,
        execution_time_ms: 0,
    })
}

/// `Nullable(LowCardinality(String))` -> `String`
fn base_type(ty: &str) -> &str {
    let mut ty = ty.trim();
    for wrapper in ["Nullable(", "LowCardinality("] {
        if let Some(inner) = ty.strip_prefix(wrapper).and_then(|t| t.strip_suffix(')')) {
            ty = inner;
        }
    }
    // a second pass catches LowCardinality(Nullable(..))
    if let Some(inner) = ty.strip_prefix("Nullable(").and_then(|t| t.strip_suffix(')')) {
        ty = inner;
    }
    ty
}

fn cell_to_value(cell: serde_json::Value, ty: &str) -> Value {
    use serde_json::Value as Json;

    if cell.is_null() {
        return Value::Null;
    }
    let ty = base_type(ty);
    let text = match &cell {
        Json::String(s) => Some(s.as_str()),
        _ => None,
    };

    if ty.starts_with("UInt") {
        let parsed = text
            .and_then(|s| s.parse().ok())
            .or_else(|| cell.as_u64());
        return parsed.map(Value::UInt64).unwrap_or(Value::from_json(cell));
    }
    if ty.starts_with("Int") {
        let parsed = text
            .and_then(|s| s.parse().ok())
            .or_else(|| cell.as_i64());
        return parsed.map(Value::Int64).unwrap_or(Value::from_json(cell));
    }
    if ty.starts_with("Float") {
        return cell.as_f64().map(Value::Float64).unwrap_or(Value::from_json(cell));
    }
    if ty.starts_with("Decimal") {
        return match cell {
            Json::Number(n) => Value::Decimal(n.to_string()),
            Json::String(s) => Value::Decimal(s),
            other => Value::from_json(other),
        };
    }
    if ty == "Bool" {
        return cell.as_bool().map(Value::Bool).unwrap_or(Value::from_json(cell));
    }
    if ty == "UUID" {
        if let Some(uuid) = text.and_then(|s| uuid::Uuid::parse_str(s).ok()) {
            return Value::Uuid(uuid);
        }
    }
    if ty == "Date" || ty == "Date32" {
        if let Some(date) = text.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()) {
            return Value::Date(date);
        }
    }
    if ty.starts_with("DateTime") {
        if let Some(dt) =
            text.and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
        {
            return Value::DateTime(dt);
        }
    }
    match cell {
        Json::Array(_) | Json::Object(_) => Value::Json(cell),
        other => Value::from_json(other),
    }
}
