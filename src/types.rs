use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Values that can be bound to a statement or read back from a result row.
///
/// One enum is shared across backends so callers never branch on driver
/// types:
/// ```rust
/// use sql_binder::prelude::*;
///
/// let params = vec![
///     SqlValue::Int(1),
///     SqlValue::Text("alice".into()),
///     SqlValue::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// Arbitrary-precision decimal value
    Decimal(Decimal),
    /// Unique identifier value
    Uuid(Uuid),
    /// JSON value
    Json(JsonValue),
    /// Binary data
    Blob(Vec<u8>),
    /// NULL value
    Null,
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float, promoting integers the way `SQLite` reports whole numbers.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SqlValue::Float(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            SqlValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Boolean, normalizing the 0/1 integers and "true"/"false" text some
    /// drivers return instead of a native boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            SqlValue::Int(0) => Some(false),
            SqlValue::Int(1) => Some(true),
            SqlValue::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            SqlValue::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// Timestamp, parsing the text forms used by drivers without a native
    /// date-time type.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::Timestamp(v) => Some(*v),
            SqlValue::Text(s) => {
                for fmt in [
                    "%Y-%m-%d %H:%M:%S%.f",
                    "%Y-%m-%d %H:%M:%S",
                    "%Y-%m-%dT%H:%M:%S%.f",
                    "%Y-%m-%dT%H:%M:%S",
                ] {
                    if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                        return Some(dt);
                    }
                }
                None
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            SqlValue::Timestamp(v) => Some(v.date()),
            SqlValue::Text(s) => {
                if let Some(ts) = self.as_timestamp() {
                    return Some(ts.date());
                }
                NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
            }
            _ => None,
        }
    }

    /// Decimal, parsing text and widening integers so both typed and
    /// text-mode drivers land on the same representation.
    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            SqlValue::Decimal(v) => Some(*v),
            SqlValue::Int(v) => Some(Decimal::from(*v)),
            SqlValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            SqlValue::Uuid(v) => Some(*v),
            SqlValue::Text(s) => Uuid::parse_str(s).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<JsonValue> {
        match self {
            SqlValue::Json(v) => Some(v.clone()),
            SqlValue::Text(s) => serde_json::from_str(s).ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Blob(v) => Some(v),
            _ => None,
        }
    }
}

/// The literal string form used by raw (`!{...}`) substitution.
///
/// Text is spliced without quoting; this is the injection-bearing path and
/// exists for identifiers that standard SQL cannot parameterize.
impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(v) => write!(f, "{v}"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            SqlValue::Decimal(v) => write!(f, "{v}"),
            SqlValue::Uuid(v) => write!(f, "{v}"),
            SqlValue::Json(v) => write!(f, "{v}"),
            SqlValue::Blob(v) => {
                write!(f, "X'")?;
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                write!(f, "'")
            }
            SqlValue::Null => write!(f, "NULL"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        SqlValue::Json(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<SqlValue>,
{
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

impl From<&SqlValue> for JsonValue {
    fn from(v: &SqlValue) -> Self {
        match v {
            SqlValue::Int(i) => JsonValue::from(*i),
            SqlValue::Float(f) => JsonValue::from(*f),
            SqlValue::Text(s) => JsonValue::from(s.clone()),
            SqlValue::Bool(b) => JsonValue::from(*b),
            SqlValue::Timestamp(ts) => {
                JsonValue::from(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            SqlValue::Decimal(d) => JsonValue::from(d.to_string()),
            SqlValue::Uuid(u) => JsonValue::from(u.to_string()),
            SqlValue::Json(j) => j.clone(),
            SqlValue::Blob(b) => JsonValue::from(b.clone()),
            SqlValue::Null => JsonValue::Null,
        }
    }
}

/// The database kind behind a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum DatabaseType {
    /// `PostgreSQL` database
    #[cfg(feature = "postgres")]
    Postgres,
    /// `SQLite` database
    #[cfg(feature = "sqlite")]
    Sqlite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_normalizes_driver_integers() {
        assert_eq!(SqlValue::Int(1).as_bool(), Some(true));
        assert_eq!(SqlValue::Int(0).as_bool(), Some(false));
        assert_eq!(SqlValue::Int(7).as_bool(), None);
        assert_eq!(SqlValue::Text("TRUE".into()).as_bool(), Some(true));
    }

    #[test]
    fn timestamp_parses_text_forms() {
        let expected = NaiveDateTime::parse_from_str("2024-01-01 08:00:01", "%Y-%m-%d %H:%M:%S")
            .expect("valid timestamp");
        assert_eq!(
            SqlValue::Text("2024-01-01 08:00:01".into()).as_timestamp(),
            Some(expected)
        );
        assert_eq!(
            SqlValue::Text("2024-01-01T08:00:01.250".into())
                .as_timestamp()
                .map(|t| t.format("%H:%M:%S%.3f").to_string()),
            Some("08:00:01.250".to_string())
        );
    }

    #[test]
    fn decimal_normalizes_text_and_int() {
        assert_eq!(
            SqlValue::Text("12.50".into()).as_decimal(),
            Some(Decimal::new(1250, 2))
        );
        assert_eq!(SqlValue::Int(12).as_decimal(), Some(Decimal::from(12)));
    }

    #[test]
    fn uuid_round_trips_through_text() {
        let id = Uuid::new_v4();
        assert_eq!(SqlValue::Text(id.to_string()).as_uuid(), Some(id));
        assert_eq!(SqlValue::Uuid(id).as_uuid(), Some(id));
    }

    #[test]
    fn raw_literal_forms() {
        assert_eq!(SqlValue::Int(42).to_string(), "42");
        assert_eq!(SqlValue::Text("users".into()).to_string(), "users");
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Blob(vec![0xab, 0x01]).to_string(), "X'ab01'");
    }
}
