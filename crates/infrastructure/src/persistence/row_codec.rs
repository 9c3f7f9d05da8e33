//! Decoding of dynamically shaped rows
//!
//! The repository selects `*` from whitelisted tables, so columns are decoded
//! by their runtime SQLite storage class, refined by the declared
//! [`ColumnKind`] of the table schema (booleans and JSON columns).

use application::{ApplicationError, TableRules};
use domain::{ColumnKind, Record};
use serde_json::Value;
use sqlx::{Column, Row, TypeInfo, ValueRef, sqlite::SqliteRow};

use super::error::map_sqlx_error;

/// Decode a row into a record keyed by storage column names
pub fn decode_row(row: &SqliteRow, rules: &TableRules) -> Result<Record, ApplicationError> {
    let mut record = Record::new();
    for (index, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let value = decode_column(row, index, rules.column_kind(name))?;
        record.insert(name.to_string(), value);
    }
    Ok(record)
}

fn decode_column(
    row: &SqliteRow,
    index: usize,
    kind: Option<ColumnKind>,
) -> Result<Value, ApplicationError> {
    let storage_class = {
        let raw = row.try_get_raw(index).map_err(map_sqlx_error)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_string()
    };

    let value = match storage_class.as_str() {
        "INTEGER" => {
            let v: i64 = row.try_get_unchecked(index).map_err(map_sqlx_error)?;
            if kind == Some(ColumnKind::Boolean) {
                Value::Bool(v != 0)
            } else {
                Value::from(v)
            }
        },
        "REAL" => {
            let v: f64 = row.try_get_unchecked(index).map_err(map_sqlx_error)?;
            Value::from(v)
        },
        "BLOB" => {
            let v: Vec<u8> = row.try_get_unchecked(index).map_err(map_sqlx_error)?;
            Value::from(v)
        },
        _ => {
            let v: String = row.try_get_unchecked(index).map_err(map_sqlx_error)?;
            if kind == Some(ColumnKind::Json) {
                serde_json::from_str(&v).unwrap_or(Value::String(v))
            } else {
                Value::String(v)
            }
        },
    };
    Ok(value)
}
