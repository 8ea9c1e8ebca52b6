//! Conversion from PostgreSQL rows to broker values

use conduit_core::Value;
use tokio_postgres::Row as PgRow;
use tokio_postgres::types::{FromSql, Type};

type DecodeResult<T> = std::result::Result<T, Box<dyn std::error::Error + Sync + Send>>;

/// NUMERIC decoded from its binary wire form into exact decimal text
#[derive(Debug)]
pub(crate) struct PgNumeric(pub String);

impl PgNumeric {
    pub(crate) fn decode(raw: &[u8]) -> DecodeResult<String> {
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }

        let ndigits = i16::from_be_bytes([raw[0], raw[1]]) as usize;
        let weight = i16::from_be_bytes([raw[2], raw[3]]) as i32;
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        let dscale = i16::from_be_bytes([raw[6], raw[7]]) as usize;

        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }
        if sign == 0xC000 {
            return Ok("NaN".to_string());
        }

        let mut digits = Vec::with_capacity(ndigits);
        for chunk in raw[8..8 + ndigits * 2].chunks_exact(2) {
            let group = u16::from_be_bytes([chunk[0], chunk[1]]);
            if group > 9999 {
                return Err("invalid NUMERIC payload: group out of range".into());
            }
            digits.push(group);
        }

        // base-10000 groups: group i has weight `weight - i`
        let integer_groups = if weight >= 0 { weight as usize + 1 } else { 0 };
        let mut integer = String::new();
        for i in 0..integer_groups {
            let group = digits.get(i).copied().unwrap_or(0);
            if integer.is_empty() {
                if group != 0 {
                    integer.push_str(&group.to_string());
                }
            } else {
                integer.push_str(&format!("{:04}", group));
            }
        }
        if integer.is_empty() {
            integer.push('0');
        }

        let mut fraction = String::new();
        if dscale > 0 {
            if weight < -1 {
                fraction.push_str(&"0000".repeat((-weight - 1) as usize));
            }
            for group in digits.iter().skip(integer_groups) {
                fraction.push_str(&format!("{:04}", group));
            }
            if fraction.len() < dscale {
                fraction.push_str(&"0".repeat(dscale - fraction.len()));
            } else {
                fraction.truncate(dscale);
            }
        }

        let mut out = String::new();
        if sign == 0x4000 && digits.iter().any(|d| *d != 0) {
            out.push('-');
        }
        out.push_str(&integer);
        if !fraction.is_empty() {
            out.push('.');
            out.push_str(&fraction);
        }
        Ok(out)
    }
}

impl<'a> FromSql<'a> for PgNumeric {
    fn from_sql(_: &Type, raw: &'a [u8]) -> DecodeResult<Self> {
        Ok(Self(Self::decode(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw UTF-8 payload, for enums and other text-encoded custom types
#[derive(Debug)]
struct PgText(String);

impl<'a> FromSql<'a> for PgText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> DecodeResult<Self> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Convert one cell, falling back to its text payload for unknown types
pub(crate) fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();
    let value = match type_name {
        "bool" => get::<bool>(row, idx).map(Value::Bool),
        "int2" => get::<i16>(row, idx).map(|v| Value::Int64(v.into())),
        "int4" => get::<i32>(row, idx).map(|v| Value::Int64(v.into())),
        "int8" => get::<i64>(row, idx).map(Value::Int64),
        "oid" => get::<u32>(row, idx).map(|v| Value::UInt64(v.into())),
        "float4" => get::<f32>(row, idx).map(|v| Value::Float64(v.into())),
        "float8" => get::<f64>(row, idx).map(Value::Float64),
        "numeric" => get::<PgNumeric>(row, idx).map(|v| Value::Decimal(v.0)),
        "text" | "varchar" | "bpchar" | "name" | "char" => get::<String>(row, idx).map(Value::String),
        "bytea" => get::<Vec<u8>>(row, idx).map(Value::Bytes),
        "uuid" => get::<uuid::Uuid>(row, idx).map(Value::Uuid),
        "json" | "jsonb" => get::<serde_json::Value>(row, idx).map(Value::Json),
        "date" => get::<chrono::NaiveDate>(row, idx).map(Value::Date),
        "time" => get::<chrono::NaiveTime>(row, idx).map(Value::Time),
        "timestamp" => get::<chrono::NaiveDateTime>(row, idx).map(Value::DateTime),
        "timestamptz" => get::<chrono::DateTime<chrono::Utc>>(row, idx).map(Value::DateTimeUtc),
        "_text" | "_varchar" => get::<Vec<String>>(row, idx)
            .map(|arr| Value::Json(serde_json::Value::from(arr))),
        "_int4" => get::<Vec<i32>>(row, idx).map(|arr| Value::Json(serde_json::Value::from(arr))),
        "_int8" => get::<Vec<i64>>(row, idx).map(|arr| Value::Json(serde_json::Value::from(arr))),
        _ => get::<PgText>(row, idx).map(|v| Value::String(v.0)),
    };
    value.unwrap_or(Value::Null)
}
