//! TDS column data to broker values

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use conduit_core::Value;
use tiberius::ColumnData;


const NANOS_PER_SECOND: u64 = 1_000_000_000;

fn days_since(year: i32, days: i64) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)?.checked_add_signed(Duration::days(days))
}

/// Increments since midnight, each `10^-scale` seconds
fn time_of_day(time: tiberius::time::Time) -> NaiveTime {
    let nanos = time.increments() * 10u64.pow(9 - time.scale().min(9) as u32);
    NaiveTime::from_num_seconds_from_midnight_opt(
        (nanos / NANOS_PER_SECOND) as u32,
        (nanos % NANOS_PER_SECOND) as u32,
    )
    .unwrap_or_default()
}

fn datetime2(date: tiberius::time::Date, time: tiberius::time::Time) -> Option<NaiveDateTime> {
    let day = days_since(1, date.days() as i64)?;
    Some(NaiveDateTime::new(day, time_of_day(time)))
}

/// Convert one cell; out-of-range dates fall back to `Null`
pub(crate) fn column_data_to_value(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::U8(v) => v.map(|i| Value::Int64(i as i64)).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(|i| Value::Int64(i as i64)).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(|i| Value::Int64(i as i64)).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::Int64).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(|f| Value::Float64(f as f64)).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::Float64).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .map(|s| Value::String(s.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v.map(Value::Uuid).unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .map(|b| Value::Bytes(b.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|n| Value::Decimal(n.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Xml(v) => v
            .map(|x| Value::String(x.into_owned().into_string()))
            .unwrap_or(Value::Null),
        ColumnData::DateTime(v) => v
            .and_then(|dt| {
                // 1/300 second ticks since 1900-01-01
                let day = days_since(1900, dt.days() as i64)?;
                let nanos = dt.seconds_fragments() as u64 * NANOS_PER_SECOND / 300;
                let time = NaiveTime::from_num_seconds_from_midnight_opt(
                    (nanos / NANOS_PER_SECOND) as u32,
                    (nanos % NANOS_PER_SECOND) as u32,
                )?;
                Some(Value::DateTime(NaiveDateTime::new(day, time)))
            })
            .unwrap_or(Value::Null),
        ColumnData::SmallDateTime(v) => v
            .and_then(|dt| {
                let day = days_since(1900, dt.days() as i64)?;
                let time = NaiveTime::from_num_seconds_from_midnight_opt(
                    dt.seconds_fragments() as u32 * 60,
                    0,
                )?;
                Some(Value::DateTime(NaiveDateTime::new(day, time)))
            })
            .unwrap_or(Value::Null),
        ColumnData::DateTime2(v) => v
            .and_then(|dt| datetime2(dt.date(), dt.time()))
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        ColumnData::DateTimeOffset(v) => v
            .and_then(|dto| {
                // stored as UTC with the offset kept alongside
                let dt2 = dto.datetime2();
                datetime2(dt2.date(), dt2.time())
            })
            .map(|naive| Value::DateTimeUtc(naive.and_utc()))
            .unwrap_or(Value::Null),
        ColumnData::Date(v) => v
            .and_then(|d| days_since(1, d.days() as i64))
            .map(Value::Date)
            .unwrap_or(Value::Null),
        ColumnData::Time(v) => v
            .map(|t| Value::Time(time_of_day(t)))
            .unwrap_or(Value::Null),
    }
}
