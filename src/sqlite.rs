//! `SQLite` driver adapter: parameter conversion and result-set building on
//! top of `rusqlite` via `deadpool-sqlite`.
//!
//! `rusqlite` is synchronous, so every function here is plain sync and runs
//! inside the pool object's `interact` closure.

use deadpool_sqlite::rusqlite;
use rusqlite::ToSql;
use rusqlite::types::Value;

use crate::error::SqlBinderError;
use crate::results::ResultSet;
use crate::types::SqlValue;

/// Convert a single [`SqlValue`] to a rusqlite [`Value`].
///
/// `SQLite` has no native boolean, timestamp, decimal, uuid, or JSON storage
/// classes; those variants are stored in their canonical text (or integer)
/// forms and normalized back by the [`SqlValue`] accessors on read.
#[must_use]
pub(crate) fn to_sqlite_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Int(i) => Value::Integer(*i),
        SqlValue::Float(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Bool(b) => Value::Integer(i64::from(*b)),
        SqlValue::Timestamp(dt) => Value::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        SqlValue::Decimal(d) => Value::Text(d.to_string()),
        SqlValue::Uuid(u) => Value::Text(u.to_string()),
        SqlValue::Json(j) => Value::Text(j.to_string()),
        SqlValue::Blob(bytes) => Value::Blob(bytes.clone()),
        SqlValue::Null => Value::Null,
    }
}

pub(crate) fn convert_params(params: &[SqlValue]) -> Vec<Value> {
    params.iter().map(to_sqlite_value).collect()
}

fn extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<SqlValue, SqlBinderError> {
    let value: Value = row.get(idx).map_err(SqlBinderError::Sqlite)?;
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    })
}

/// Run a query and build a [`ResultSet`].
///
/// # Errors
///
/// Returns errors from statement preparation, execution, or row extraction.
pub(crate) fn run_query(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> Result<ResultSet, SqlBinderError> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|name| (*name).to_string())
        .collect();
    let column_count = columns.len();

    let refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let mut rows = stmt.query(&refs[..])?;

    let mut result_set = ResultSet::with_capacity(8);
    result_set.set_columns(columns);
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            values.push(extract_value(row, idx)?);
        }
        result_set.add_row_values(values);
    }
    Ok(result_set)
}

/// Run a DML statement and return rows affected.
///
/// # Errors
///
/// Returns errors from statement preparation or execution.
pub(crate) fn run_dml(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[Value],
) -> Result<u64, SqlBinderError> {
    let mut stmt = conn.prepare(sql)?;
    let refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let affected = stmt.execute(&refs[..])?;
    Ok(affected as u64)
}

/// Run a batch of statements with no parameters.
///
/// # Errors
///
/// Returns errors from batch execution.
pub(crate) fn run_batch(conn: &rusqlite::Connection, sql: &str) -> Result<(), SqlBinderError> {
    conn.execute_batch(sql)?;
    Ok(())
}
