//! RESP reply to JSON

use serde_json::{Map, Value as Json};


fn bulk_to_json(bytes: &[u8]) -> Json {
    match std::str::from_utf8(bytes) {
        Ok(text) => Json::String(text.to_string()),
        // binary payloads are shown as byte arrays
        Err(_) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
    }
}

fn key_string(value: &redis::Value) -> String {
    match reply_to_json(value) {
        Json::String(s) => s,
        other => other.to_string(),
    }
}

/// Convert a reply, RESP3 maps and sets included
pub fn reply_to_json(value: &redis::Value) -> Json {
    match value {
        redis::Value::Nil => Json::Null,
        redis::Value::Int(n) => Json::from(*n),
        redis::Value::BulkString(data) => bulk_to_json(data),
        redis::Value::Okay => Json::String("OK".to_string()),
        redis::Value::SimpleString(s) => Json::String(s.clone()),
        redis::Value::Double(d) => serde_json::Number::from_f64(*d)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        redis::Value::Boolean(b) => Json::Bool(*b),
        redis::Value::Array(items) | redis::Value::Set(items) => {
            Json::Array(items.iter().map(reply_to_json).collect())
        }
        redis::Value::Push { data, .. } => Json::Array(data.iter().map(reply_to_json).collect()),
        redis::Value::Map(pairs) => {
            let mut map = Map::new();
            for (k, v) in pairs {
                map.insert(key_string(k), reply_to_json(v));
            }
            Json::Object(map)
        }
        redis::Value::Attribute { data, .. } => reply_to_json(data),
        redis::Value::VerbatimString { text, .. } => Json::String(text.clone()),
        redis::Value::BigNumber(n) => Json::String(n.to_string()),
        redis::Value::ServerError(err) => Json::String(format!("ERR {:?}", err)),
    }
}
