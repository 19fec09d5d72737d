//! Row-to-entry parsing helpers.
//!
//! `libsql::Row` is column-indexed. These helpers isolate the parsing logic
//! and handle the dual datetime format issue (`SQLite`'s `datetime('now')` vs
//! Rust's `to_rfc3339()`).

use chrono::{DateTime, Utc};
use trail_core::entities::TrailEntry;
use uuid::Uuid;

use crate::error::DatabaseError;

/// Column list matching [`row_to_entry`].
pub const ENTRY_COLUMNS: &str = "sequence, entity_type, entity_id, snapshot, action, \
     timestamp, actor, device, tenant, transaction_id, current";

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 (`"2026-02-09T14:30:00+00:00"`) and `SQLite`'s default
/// format (`"2026-02-09 14:30:00"`).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse a TEXT column into a serde-deserializable enum.
///
/// Works with all trail-core enums that use `#[serde(rename_all = "snake_case")]`.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any enum variant.
pub fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable TEXT column. Only SQL NULL maps to `None`; an empty string
/// is a value.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    Ok(row.get::<Option<String>>(idx)?)
}

/// Parse a nullable TEXT column holding a hyphenated UUID.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty value is not a UUID.
pub fn parse_optional_uuid(s: Option<&str>) -> Result<Option<Uuid>, DatabaseError> {
    match s {
        Some(s) if !s.is_empty() => Uuid::parse_str(s)
            .map(Some)
            .map_err(|e| DatabaseError::Query(format!("Invalid UUID '{s}': {e}"))),
        _ => Ok(None),
    }
}

/// Parse the snapshot column.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the column contains invalid JSON.
pub fn parse_json(s: &str) -> Result<serde_json::Value, DatabaseError> {
    serde_json::from_str(s).map_err(|e| DatabaseError::Query(format!("Invalid JSON in column: {e}")))
}

/// Convert a row selected with [`ENTRY_COLUMNS`] into a `TrailEntry`.
///
/// # Errors
///
/// Returns `DatabaseError` if any column is missing or malformed.
pub fn row_to_entry(row: &libsql::Row) -> Result<TrailEntry, DatabaseError> {
    Ok(TrailEntry {
        sequence: Some(row.get::<i64>(0)?),
        entity_type: row.get::<String>(1)?,
        entity_id: get_opt_string(row, 2)?,
        snapshot: parse_json(&row.get::<String>(3)?)?,
        action: parse_enum(&row.get::<String>(4)?)?,
        timestamp: parse_datetime(&row.get::<String>(5)?)?,
        actor: row.get::<String>(6)?,
        device: row.get::<String>(7)?,
        tenant: get_opt_string(row, 8)?,
        transaction_id: parse_optional_uuid(get_opt_string(row, 9)?.as_deref())?,
        current: row.get::<i64>(10)? != 0,
    })
}
