//! Conversion of result rows into the shapes a binding declares.
//!
//! Column-to-field correspondence is by name. A target field whose column is
//! absent is a mapping error (partial construction is not supported), while
//! extra columns not named by the target are ignored. This policy is applied
//! uniformly by every [`FromRow`] implementation in the crate.

use std::collections::HashMap;
use std::marker::PhantomData;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::SqlBinderError;
use crate::results::{ResultSet, Row};
use crate::types::SqlValue;

/// Convert one result row into a caller-facing value.
///
/// Scalar implementations demand exactly one column; structured
/// implementations pick columns by name via [`column`].
pub trait FromRow: Sized {
    /// Map a row.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::Mapping`], [`SqlBinderError::TooManyColumns`],
    /// or a conversion-specific mapping error.
    fn from_row(row: &Row) -> Result<Self, SqlBinderError>;
}

/// Fetch a named column, failing with a mapping error when absent.
///
/// # Errors
///
/// Returns [`SqlBinderError::Mapping`] naming the missing column.
pub fn column<'r>(row: &'r Row, name: &str) -> Result<&'r SqlValue, SqlBinderError> {
    row.get(name)
        .ok_or_else(|| SqlBinderError::Mapping(format!("missing column '{name}'")))
}

fn single_column(row: &Row) -> Result<&SqlValue, SqlBinderError> {
    if row.len() != 1 {
        return Err(SqlBinderError::TooManyColumns(row.len()));
    }
    row.get_by_index(0)
        .ok_or_else(|| SqlBinderError::Mapping("row has no columns".to_string()))
}

macro_rules! scalar_from_row {
    ($ty:ty, $accessor:ident, $what:expr) => {
        impl FromRow for $ty {
            fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
                let value = single_column(row)?;
                value.$accessor().ok_or_else(|| {
                    SqlBinderError::Mapping(format!("cannot read {value:?} as {}", $what))
                })
            }
        }
    };
}

scalar_from_row!(i64, as_int, "integer");
scalar_from_row!(f64, as_float, "float");
scalar_from_row!(bool, as_bool, "boolean");
scalar_from_row!(NaiveDateTime, as_timestamp, "timestamp");
scalar_from_row!(NaiveDate, as_date, "date");
scalar_from_row!(Decimal, as_decimal, "decimal");
scalar_from_row!(Uuid, as_uuid, "uuid");
scalar_from_row!(JsonValue, as_json, "json");

impl FromRow for i32 {
    fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
        let wide = i64::from_row(row)?;
        i32::try_from(wide)
            .map_err(|_| SqlBinderError::Mapping(format!("integer {wide} out of i32 range")))
    }
}

impl FromRow for String {
    fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
        let value = single_column(row)?;
        match value {
            SqlValue::Text(s) => Ok(s.clone()),
            SqlValue::Null => Err(SqlBinderError::Mapping(
                "cannot read NULL as text".to_string(),
            )),
            other => Ok(other.to_string()),
        }
    }
}

impl FromRow for Vec<u8> {
    fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
        let value = single_column(row)?;
        value
            .as_blob()
            .map(<[u8]>::to_vec)
            .ok_or_else(|| SqlBinderError::Mapping(format!("cannot read {value:?} as blob")))
    }
}

impl FromRow for Row {
    fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
        Ok(row.clone())
    }
}

impl FromRow for HashMap<String, SqlValue> {
    fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
        Ok(row
            .columns()
            .iter()
            .enumerate()
            .filter_map(|(i, name)| row.get_by_index(i).map(|v| (name.clone(), v.clone())))
            .collect())
    }
}

/// Map a result expected to hold at most one row.
///
/// # Errors
///
/// Returns [`SqlBinderError::TooManyRows`] for two or more rows, or the row's
/// mapping error.
pub fn map_one<T: FromRow>(results: &ResultSet) -> Result<Option<T>, SqlBinderError> {
    match results.len() {
        0 => Ok(None),
        1 => T::from_row(&results.rows()[0]).map(Some),
        n => Err(SqlBinderError::TooManyRows(n)),
    }
}

/// Eagerly map every row in order.
///
/// # Errors
///
/// Returns the first row's mapping error, if any.
pub fn map_all<T: FromRow>(results: ResultSet) -> Result<Vec<T>, SqlBinderError> {
    results.into_rows().iter().map(T::from_row).collect()
}

/// A forward-only sequence of mapped rows.
///
/// Rows are drained from the buffered driver result; each element is mapped
/// only when the consumer asks for it, in row order. The stream is not
/// restartable: once exhausted, further calls yield nothing.
pub struct RowStream<T: FromRow> {
    rows: std::vec::IntoIter<Row>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: FromRow> RowStream<T> {
    pub(crate) fn new(results: ResultSet) -> Self {
        Self {
            rows: results.into_rows().into_iter(),
            _marker: PhantomData,
        }
    }

    /// Rows not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl<T: FromRow> Iterator for RowStream<T> {
    type Item = Result<T, SqlBinderError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|row| T::from_row(&row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_set(columns: &[&str], rows: &[&[SqlValue]]) -> ResultSet {
        let mut rs = ResultSet::with_capacity(rows.len());
        rs.set_columns(columns.iter().map(|c| (*c).to_string()).collect());
        for row in rows {
            rs.add_row_values(row.to_vec());
        }
        rs
    }

    #[test]
    fn scalar_single_absence_value_and_error_cases() {
        let empty = result_set(&["n"], &[]);
        assert_eq!(map_one::<i64>(&empty).unwrap(), None);

        let one = result_set(&["n"], &[&[SqlValue::Int(7)]]);
        assert_eq!(map_one::<i64>(&one).unwrap(), Some(7));

        let two = result_set(&["n"], &[&[SqlValue::Int(1)], &[SqlValue::Int(2)]]);
        assert!(matches!(
            map_one::<i64>(&two).unwrap_err(),
            SqlBinderError::TooManyRows(2)
        ));

        let wide = result_set(&["a", "b"], &[&[SqlValue::Int(1), SqlValue::Int(2)]]);
        assert!(matches!(
            map_one::<i64>(&wide).unwrap_err(),
            SqlBinderError::TooManyColumns(2)
        ));
    }

    #[test]
    fn structured_single_maps_by_column_name() {
        let rs = result_set(
            &["id", "name"],
            &[&[SqlValue::Int(4), SqlValue::Text("d".into())]],
        );
        let mapped: HashMap<String, SqlValue> = map_one(&rs).unwrap().unwrap();
        assert_eq!(mapped["id"], SqlValue::Int(4));
        assert_eq!(mapped["name"], SqlValue::Text("d".into()));
    }

    #[test]
    fn missing_column_is_a_mapping_error() {
        #[derive(Debug)]
        struct Named {
            #[allow(dead_code)]
            name: String,
        }
        impl FromRow for Named {
            fn from_row(row: &Row) -> Result<Self, SqlBinderError> {
                Ok(Self {
                    name: column(row, "name")?
                        .as_text()
                        .unwrap_or_default()
                        .to_string(),
                })
            }
        }
        let rs = result_set(&["id"], &[&[SqlValue::Int(1)]]);
        assert!(matches!(
            map_one::<Named>(&rs).unwrap_err(),
            SqlBinderError::Mapping(_)
        ));
    }

    #[test]
    fn row_stream_is_ordered_and_not_restartable() {
        let rs = result_set(
            &["n"],
            &[&[SqlValue::Int(1)], &[SqlValue::Int(2)], &[SqlValue::Int(3)]],
        );
        let mut stream: RowStream<i64> = RowStream::new(rs);
        let first: Vec<i64> = stream.by_ref().map(Result::unwrap).collect();
        assert_eq!(first, vec![1, 2, 3]);
        assert!(stream.next().is_none());
        assert_eq!(stream.remaining(), 0);
    }
}
