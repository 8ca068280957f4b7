use std::error::Error;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Row, Statement};
use tokio_util::bytes::Buf;
use uuid::Uuid;

use crate::error::SqlEzError;
use crate::results::RowShape;
use crate::types::RowValues;

/// Column layout of a prepared statement.
pub(crate) fn statement_shape(stmt: &Statement) -> RowShape {
    RowShape::new(
        stmt.columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect(),
    )
}

/// Decode every column of `row`, in column order.
pub(crate) fn extract_row(row: &Row) -> Result<Vec<RowValues>, SqlEzError> {
    (0..row.len())
        .map(|idx| postgres_extract_value(row, idx))
        .collect()
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// `NUMERIC`, `UUID`, `INET`, `TIME` and `INTERVAL` come back as their text form so no
/// precision is lost. Any other type is read as text when it is text-like (enums and
/// extension types such as `citext`), and as raw bytes otherwise.
///
/// # Errors
/// Returns `SqlEzError::ParameterError` for an index past the last column, and
/// `SqlEzError::PostgresError` if the column cannot be decoded.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlEzError> {
    let Some(column) = row.columns().get(idx) else {
        return Err(SqlEzError::ParameterError(format!(
            "column index {idx} out of range for a row of {} columns",
            row.len()
        )));
    };
    let value = match *column.type_() {
        Type::INT2 => row
            .try_get::<_, Option<i16>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::INT4 => row
            .try_get::<_, Option<i32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::INT8 => row
            .try_get::<_, Option<i64>>(idx)?
            .map_or(RowValues::Null, RowValues::Int),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Int(i64::from(v))),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row
            .try_get::<_, Option<f64>>(idx)?
            .map_or(RowValues::Null, RowValues::Float),
        Type::NUMERIC => row
            .try_get::<_, Option<Decimal>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.to_string())),
        Type::BOOL => row
            .try_get::<_, Option<bool>>(idx)?
            .map_or(RowValues::Null, RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map_or(RowValues::Null, RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(RowValues::Null, RowValues::Timestamp),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.to_string())),
        Type::INTERVAL => row
            .try_get::<_, Option<IntervalText>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.0)),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.to_string())),
        Type::INET => row
            .try_get::<_, Option<IpAddr>>(idx)?
            .map_or(RowValues::Null, |v| RowValues::Text(v.to_string())),
        // "char" is a single byte on the wire
        Type::CHAR => row
            .try_get::<_, Option<i8>>(idx)?
            .map_or(RowValues::Null, |v| {
                RowValues::Text(char::from(v.to_ne_bytes()[0]).to_string())
            }),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<Value>>(idx)?
            .map_or(RowValues::Null, RowValues::JSON),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map_or(RowValues::Null, RowValues::Blob),
        _ => row
            .try_get::<_, Option<Untyped>>(idx)?
            .map_or(RowValues::Null, |v| v.0),
    };
    Ok(value)
}

/// Any column type without a dedicated decoder.
struct Untyped(RowValues);

impl<'a> FromSql<'a> for Untyped {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        let text_like = <String as FromSql>::accepts(ty) || matches!(ty.kind(), Kind::Enum(_));
        let value = match std::str::from_utf8(raw) {
            Ok(text) if text_like => RowValues::Text(text.to_owned()),
            _ => RowValues::Blob(raw.to_vec()),
        };
        Ok(Self(value))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// `INTERVAL` rendered the way `psql` prints it, e.g. `1 year 2 mons 3 days 04:05:06`.
struct IntervalText(String);

impl<'a> FromSql<'a> for IntervalText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        if raw.len() != 16 {
            return Err(format!("interval payload has {} bytes, expected 16", raw.len()).into());
        }
        let mut raw = raw;
        let micros = raw.get_i64();
        let days = raw.get_i32();
        let months = raw.get_i32();
        Ok(Self(format_interval(months, days, micros)))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(*ty, Type::INTERVAL)
    }
}

fn format_interval(months: i32, days: i32, micros: i64) -> String {
    fn unit(n: i32, name: &str) -> String {
        if n == 1 {
            format!("{n} {name}")
        } else {
            format!("{n} {name}s")
        }
    }

    let mut parts = Vec::new();
    if months / 12 != 0 {
        parts.push(unit(months / 12, "year"));
    }
    if months % 12 != 0 {
        parts.push(unit(months % 12, "mon"));
    }
    if days != 0 {
        parts.push(unit(days, "day"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let abs = micros.unsigned_abs();
        let secs = abs / 1_000_000;
        let mut time = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        let frac = abs % 1_000_000;
        if frac != 0 {
            time.push('.');
            time.push_str(format!("{frac:06}").trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}
