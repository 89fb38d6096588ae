//! Field values, row access and the ordering used by table queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use uuid::Uuid;

/// A polymorphic field value that can hold different types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Null,
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get numeric values as `f64`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the value as a UUID if possible
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(u) => Some(*u),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Check if the value is a float NaN
    pub fn is_nan(&self) -> bool {
        matches!(self, FieldValue::Float(f) if f.is_nan())
    }

    /// Text a free-text search matches against; `None` for null
    pub fn search_text(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => Some(s.clone()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Float(f) => Some(f.to_string()),
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::Uuid(u) => Some(u.to_string()),
            FieldValue::DateTime(d) => Some(d.to_rfc3339()),
            FieldValue::Null => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            FieldValue::Boolean(_) => 0,
            FieldValue::Integer(_) | FieldValue::Float(_) => 1,
            FieldValue::String(_) => 2,
            FieldValue::Uuid(_) => 3,
            FieldValue::DateTime(_) => 4,
            FieldValue::Null => 5,
        }
    }

    /// Natural ascending order between two values
    ///
    /// Strings use [`collate`], numbers compare numerically across integer
    /// and float (NaN above every number), values of unrelated types order
    /// by kind. Equal values return `Ordering::Equal` so stable sorts keep
    /// their input order.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::String(a), FieldValue::String(b)) => collate(a, b),
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
            (FieldValue::Uuid(a), FieldValue::Uuid(b)) => a.cmp(b),
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => match (x.is_nan(), y.is_nan()) {
                    (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                    (a_nan, b_nan) => a_nan.cmp(&b_nan),
                },
                _ => a.rank().cmp(&b.rank()),
            },
        }
    }
}

/// Locale-style string collation
///
/// Letters compare case-insensitively first; on a tie lowercase sorts
/// before uppercase, then raw code points decide.
pub fn collate(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Integer(i64::from(i))
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Float(f)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<Uuid> for FieldValue {
    fn from(u: Uuid) -> Self {
        FieldValue::Uuid(u)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::DateTime(d)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map(FieldValue::Float).unwrap_or(FieldValue::Null),
            },
            Value::String(s) => FieldValue::String(s.clone()),
            other => FieldValue::String(other.to_string()),
        }
    }
}

/// A record the table query engine can search and sort
///
/// Implemented for JSON objects; use [`impl_table_row!`](crate::impl_table_row)
/// for plain structs.
pub trait TableRow {
    /// Value of the named field, `None` when the row has no such field
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Every field value of the row
    fn field_values(&self) -> Vec<FieldValue>;
}

impl TableRow for Map<String, Value> {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.get(name).map(FieldValue::from)
    }

    fn field_values(&self) -> Vec<FieldValue> {
        self.values().map(FieldValue::from).collect()
    }
}

impl TableRow for Value {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.as_object().and_then(|map| map.field(name))
    }

    fn field_values(&self) -> Vec<FieldValue> {
        self.as_object().map(|map| map.field_values()).unwrap_or_default()
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __table_row_name {
    ($field:ident) => {
        stringify!($field)
    };
    ($field:ident, $name:literal) => {
        $name
    };
}

/// Implement [`TableRow`] for a struct by listing its queryable fields
///
/// Fields may be exposed under a different name with `as "name"`.
///
/// # Example
/// ```rust,ignore
/// impl_table_row!(User {
///     id,
///     name,
///     email,
///     created_at as "createdAt",
/// });
/// ```
#[macro_export]
macro_rules! impl_table_row {
    ($type:ty { $($field:ident $(as $name:literal)?),* $(,)? }) => {
        impl $crate::core::field::TableRow for $type {
            fn field(&self, name: &str) -> Option<$crate::core::field::FieldValue> {
                $(
                    if name == $crate::__table_row_name!($field $(, $name)?) {
                        return Some($crate::core::field::FieldValue::from(self.$field.clone()));
                    }
                )*
                None
            }

            fn field_values(&self) -> Vec<$crate::core::field::FieldValue> {
                vec![$($crate::core::field::FieldValue::from(self.$field.clone())),*]
            }
        }
    };
}
