//! In-memory table store for testing and development

use crate::core::error::{CrudResult, StorageError};
use crate::core::field::{FieldValue, TableRow};
use crate::core::store::TableStore;
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::{Arc, RwLock};

const BACKEND: &str = "memory";

/// Filter predicate understood by [`InMemoryTable`]
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// SQL `LIKE`: `%` matches any run, `_` one character; case-insensitive
    Like { field: String, pattern: String },
    /// Field equals value (compared by text when the kinds differ)
    Eq { field: String, value: FieldValue },
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Like {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Condition::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Any of `fields` contains `text`
    pub fn contains_any(fields: &[&str], text: &str) -> Self {
        let pattern = format!("%{}%", text);
        Condition::Or(
            fields
                .iter()
                .map(|field| Condition::like(*field, pattern.clone()))
                .collect(),
        )
    }

    pub fn matches<R: TableRow>(&self, row: &R) -> bool {
        match self {
            Condition::Like { field, pattern } => row
                .field(field)
                .and_then(|value| value.search_text())
                .is_some_and(|text| like_match(&text, pattern)),
            Condition::Eq { field, value } => match row.field(field) {
                Some(found) if !found.is_null() => {
                    found == *value
                        || (found.search_text().is_some() && found.search_text() == value.search_text())
                }
                _ => false,
            },
            Condition::And(all) => all.iter().all(|c| c.matches(row)),
            Condition::Or(any) => any.iter().any(|c| c.matches(row)),
        }
    }
}

/// Case-insensitive SQL LIKE
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((bp, bt)) => {
                    p = bp + 1;
                    t = bt + 1;
                    backtrack = Some((bp, bt + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

struct TableState<R> {
    rows: Vec<R>,
    next_id: i64,
}

/// In-memory table with an auto-increment integer key
///
/// Rows are stored as `R` and converted through JSON on insert and update,
/// so `R` can be a plain struct or a JSON object.
pub struct InMemoryTable<R = Map<String, Value>> {
    name: String,
    primary_key: String,
    state: Arc<RwLock<TableState<R>>>,
}

impl<R> Clone for InMemoryTable<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            primary_key: self.primary_key.clone(),
            state: self.state.clone(),
        }
    }
}

impl<R> InMemoryTable<R>
where
    R: TableRow + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create an empty table whose key column is `primary_key`
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            state: Arc::new(RwLock::new(TableState {
                rows: Vec::new(),
                next_id: 1,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn row_id(&self, row: &R) -> Option<i64> {
        row.field(&self.primary_key).and_then(|v| v.as_integer())
    }

    fn operation_error(operation: &str, message: impl ToString) -> StorageError {
        StorageError::OperationFailed {
            backend: BACKEND.to_string(),
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    fn decode(operation: &str, value: Value) -> Result<R, StorageError> {
        serde_json::from_value(value).map_err(|e| Self::operation_error(operation, e))
    }

    fn select(&self, filters: &[Condition]) -> CrudResult<Vec<R>> {
        let state = self
            .state
            .read()
            .map_err(|e| Self::operation_error("read", e))?;
        Ok(state
            .rows
            .iter()
            .filter(|row| filters.iter().all(|f| f.matches(*row)))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl<R> TableStore for InMemoryTable<R>
where
    R: TableRow + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Row = R;
    type Filter = Condition;

    async fn fetch(&self, filters: &[Condition]) -> CrudResult<Vec<R>> {
        self.select(filters)
    }

    async fn count(&self, filters: &[Condition]) -> CrudResult<u64> {
        Ok(self.select(filters)?.len() as u64)
    }

    async fn get(&self, id: i64) -> CrudResult<Option<R>> {
        let state = self
            .state
            .read()
            .map_err(|e| Self::operation_error("read", e))?;
        Ok(state
            .rows
            .iter()
            .find(|row| self.row_id(row) == Some(id))
            .cloned())
    }

    async fn insert(&self, mut values: Map<String, Value>) -> CrudResult<R> {
        let mut state = self
            .state
            .write()
            .map_err(|e| Self::operation_error("insert", e))?;

        let id = state.next_id;
        values.insert(self.primary_key.clone(), Value::from(id));
        let row = Self::decode("insert", Value::Object(values))?;

        state.next_id += 1;
        state.rows.push(row.clone());
        tracing::debug!(table = %self.name, id, "row inserted");
        Ok(row)
    }

    async fn update(&self, id: i64, changes: Map<String, Value>) -> CrudResult<Option<R>> {
        let mut state = self
            .state
            .write()
            .map_err(|e| Self::operation_error("update", e))?;

        let Some(index) = state.rows.iter().position(|row| self.row_id(row) == Some(id)) else {
            return Ok(None);
        };

        let mut current = match serde_json::to_value(&state.rows[index]) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(Self::operation_error("update", e).into()),
        };
        for (key, value) in changes {
            if key != self.primary_key {
                current.insert(key, value);
            }
        }

        let row = Self::decode("update", Value::Object(current))?;
        state.rows[index] = row.clone();
        Ok(Some(row))
    }

    async fn delete(&self, id: i64) -> CrudResult<Option<R>> {
        let mut state = self
            .state
            .write()
            .map_err(|e| Self::operation_error("delete", e))?;

        let Some(index) = state.rows.iter().position(|row| self.row_id(row) == Some(id)) else {
            return Ok(None);
        };
        Ok(Some(state.rows.remove(index)))
    }
}
