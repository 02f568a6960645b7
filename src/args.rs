//! Bind arguments and the environment templates are rendered against.
//!
//! Dotted template paths (`#{model.name}`) resolve through [`BindArg`]: the
//! first path segment names an argument in the [`BindEnv`], each further
//! segment is a field lookup on the previous value. The trait is implemented
//! for scalars, JSON values, and maps; consumers implement it for their own
//! types to expose fields by name.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::SqlBinderError;
use crate::types::SqlValue;

/// A value usable as a named statement argument.
///
/// `field` is the capability hook for dotted-path resolution; the default
/// implementation exposes no fields, which is right for scalars.
pub trait BindArg: Send + Sync {
    /// Look up a named field on this value.
    fn field(&self, _name: &str) -> Option<&dyn BindArg> {
        None
    }

    /// The driver-facing value for this argument.
    fn to_sql_value(&self) -> SqlValue;
}

impl BindArg for SqlValue {
    fn field(&self, name: &str) -> Option<&dyn BindArg> {
        match self {
            SqlValue::Json(v) => v.field(name),
            _ => None,
        }
    }

    fn to_sql_value(&self) -> SqlValue {
        self.clone()
    }
}

macro_rules! scalar_bind_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl BindArg for $ty {
                fn to_sql_value(&self) -> SqlValue {
                    self.clone().into()
                }
            }
        )*
    };
}

scalar_bind_arg!(i64, i32, f64, bool, String, NaiveDateTime, Decimal, Uuid, Vec<u8>);

impl BindArg for str {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl BindArg for NaiveDate {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.format("%Y-%m-%d").to_string())
    }
}

impl BindArg for JsonValue {
    fn field(&self, name: &str) -> Option<&dyn BindArg> {
        match self {
            JsonValue::Object(map) => map.get(name).map(|v| v as &dyn BindArg),
            _ => None,
        }
    }

    fn to_sql_value(&self) -> SqlValue {
        match self {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::Json(self.clone()),
        }
    }
}

impl<V: BindArg> BindArg for HashMap<String, V> {
    fn field(&self, name: &str) -> Option<&dyn BindArg> {
        self.get(name).map(|v| v as &dyn BindArg)
    }

    fn to_sql_value(&self) -> SqlValue {
        let map: serde_json::Map<String, JsonValue> = self
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::from(&v.to_sql_value())))
            .collect();
        SqlValue::Json(JsonValue::Object(map))
    }
}

impl<V: BindArg> BindArg for BTreeMap<String, V> {
    fn field(&self, name: &str) -> Option<&dyn BindArg> {
        self.get(name).map(|v| v as &dyn BindArg)
    }

    fn to_sql_value(&self) -> SqlValue {
        let map: serde_json::Map<String, JsonValue> = self
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::from(&v.to_sql_value())))
            .collect();
        SqlValue::Json(JsonValue::Object(map))
    }
}

impl<T: BindArg> BindArg for Option<T> {
    fn field(&self, name: &str) -> Option<&dyn BindArg> {
        self.as_ref().and_then(|v| v.field(name))
    }

    fn to_sql_value(&self) -> SqlValue {
        self.as_ref().map_or(SqlValue::Null, BindArg::to_sql_value)
    }
}

impl<T: BindArg + ?Sized> BindArg for &T {
    fn field(&self, name: &str) -> Option<&dyn BindArg> {
        (**self).field(name)
    }

    fn to_sql_value(&self) -> SqlValue {
        (**self).to_sql_value()
    }
}

/// Named arguments for one statement call.
///
/// ```rust
/// use sql_binder::prelude::*;
/// use serde_json::json;
///
/// let model = json!({"name": "widget", "price": 4});
/// let limit = 10i64;
/// let env = BindEnv::new().arg("model", &model).arg("limit", &limit);
/// # let _ = env;
/// ```
#[derive(Default)]
pub struct BindEnv<'a> {
    entries: Vec<(&'a str, &'a dyn BindArg)>,
}

impl<'a> BindEnv<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add a named argument, replacing any earlier argument of the same name.
    #[must_use]
    pub fn arg(mut self, name: &'a str, value: &'a dyn BindArg) -> Self {
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, value));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn BindArg> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Resolve a dotted path against this environment.
    ///
    /// # Errors
    ///
    /// Returns [`SqlBinderError::UnresolvedReference`] naming the full path
    /// when the root argument is missing or any segment has no such field.
    pub fn resolve(&self, segments: &[String]) -> Result<SqlValue, SqlBinderError> {
        let unresolved = || SqlBinderError::UnresolvedReference(segments.join("."));
        let mut node = self.get(&segments[0]).ok_or_else(unresolved)?;
        for segment in &segments[1..] {
            node = node.field(segment).ok_or_else(unresolved)?;
        }
        Ok(node.to_sql_value())
    }
}
