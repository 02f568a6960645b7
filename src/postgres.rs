//! `PostgreSQL` driver adapter: parameter conversion and result-set building
//! on top of `tokio-postgres`.

use std::error::Error;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use tokio_postgres::Client;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use uuid::Uuid;

use crate::error::SqlBinderError;
use crate::results::ResultSet;
use crate::types::SqlValue;

/// Container for `PostgreSQL` parameters with lifetime tracking.
pub(crate) struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    pub(crate) fn convert(params: &'a [SqlValue]) -> Params<'a> {
        Params {
            references: params.iter().map(|p| p as &(dyn ToSql + Sync)).collect(),
        }
    }

    pub(crate) fn as_refs(&self) -> &[&'a (dyn ToSql + Sync)] {
        &self.references
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::Int(i) => (*i).to_sql(ty, out),
            SqlValue::Float(f) => (*f).to_sql(ty, out),
            SqlValue::Text(s) => s.to_sql(ty, out),
            SqlValue::Bool(b) => (*b).to_sql(ty, out),
            SqlValue::Timestamp(dt) => dt.to_sql(ty, out),
            SqlValue::Decimal(d) => d.to_sql(ty, out),
            SqlValue::Uuid(u) => u.to_sql(ty, out),
            SqlValue::Json(j) => j.to_sql(ty, out),
            SqlValue::Blob(bytes) => bytes.to_sql(ty, out),
            SqlValue::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::NUMERIC
                | Type::TEXT
                | Type::VARCHAR
                | Type::CHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::UUID
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

/// Extract a [`SqlValue`] from a `tokio_postgres` row at the given index.
///
/// # Errors
///
/// Returns the driver error when the column cannot be retrieved as the
/// declared type.
pub(crate) fn extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<SqlValue, SqlBinderError> {
    let type_info = row.columns()[idx].type_();
    match type_info.name() {
        "int2" => {
            let val: Option<i16> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))))
        }
        "int4" => {
            let val: Option<i32> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, |v| SqlValue::Int(i64::from(v))))
        }
        "int8" => {
            let val: Option<i64> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Int))
        }
        "float4" | "float8" => {
            let val: Option<f64> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Float))
        }
        "numeric" => {
            let val: Option<Decimal> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Decimal))
        }
        "bool" => {
            let val: Option<bool> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Bool))
        }
        "timestamp" | "timestamptz" => {
            let val: Option<NaiveDateTime> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Timestamp))
        }
        "date" => {
            let val: Option<chrono::NaiveDate> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, |d| {
                SqlValue::Timestamp(d.and_time(chrono::NaiveTime::MIN))
            }))
        }
        "uuid" => {
            let val: Option<Uuid> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Uuid))
        }
        "json" | "jsonb" => {
            let val: Option<JsonValue> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Json))
        }
        "bytea" => {
            let val: Option<Vec<u8>> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Blob))
        }
        _ => {
            let val: Option<String> = row.try_get(idx)?;
            Ok(val.map_or(SqlValue::Null, SqlValue::Text))
        }
    }
}

/// Build a [`ResultSet`] from raw `tokio_postgres` rows.
///
/// # Errors
///
/// Returns errors from row value extraction.
pub(crate) fn build_result_set(
    rows: &[tokio_postgres::Row],
) -> Result<ResultSet, SqlBinderError> {
    let mut result_set = ResultSet::with_capacity(rows.len());
    if let Some(row) = rows.first() {
        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        result_set.set_columns(columns);
    }

    for row in rows {
        let col_count = row.columns().len();
        let mut values = Vec::with_capacity(col_count);
        for idx in 0..col_count {
            values.push(extract_value(row, idx)?);
        }
        result_set.add_row_values(values);
    }

    Ok(result_set)
}

/// Execute a SELECT on a client and build the result set.
///
/// # Errors
///
/// Returns errors from query execution or result processing.
pub(crate) async fn execute_query(
    client: &Client,
    sql: &str,
    params: &[SqlValue],
) -> Result<ResultSet, SqlBinderError> {
    let converted = Params::convert(params);
    let rows = client.query(sql, converted.as_refs()).await?;
    build_result_set(&rows)
}

/// Execute a DML statement and return rows affected.
///
/// # Errors
///
/// Returns errors from statement execution.
pub(crate) async fn execute_dml(
    client: &Client,
    sql: &str,
    params: &[SqlValue],
) -> Result<u64, SqlBinderError> {
    let converted = Params::convert(params);
    Ok(client.execute(sql, converted.as_refs()).await?)
}

/// Execute a batch of statements with no parameters.
///
/// # Errors
///
/// Returns errors from batch execution.
pub(crate) async fn execute_batch(client: &Client, sql: &str) -> Result<(), SqlBinderError> {
    Ok(client.batch_execute(sql).await?)
}
