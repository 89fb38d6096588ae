//! Object schemas derived from table definitions
//!
//! A [`TableDef`] describes the columns of a stored collection. From it we
//! derive the three shapes a CRUD endpoint needs:
//!
//! - `select_schema` checks rows going out (strict, every column present)
//! - `insert_schema` checks create payloads (keys with defaults optional)
//! - `update_schema` checks partial updates (everything optional, no key)
//!
//! Per-field [`FieldRule`]s from configuration are layered on top.

use super::filters::{self, Filter};
use super::rules::{FieldRule, RuleSet, Validator, build_all};
use crate::core::error::ConfigError;
use crate::core::schema::{Schema, Violations, join_path};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Columns that default to the current time on insert
const AUTO_TIMESTAMP_COLUMNS: [&str; 2] = ["createdAt", "updatedAt"];

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    Boolean,
    /// Stored as an RFC 3339 string
    Timestamp,
}

impl ColumnKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            ColumnKind::Integer => value.is_i64() || value.is_u64(),
            ColumnKind::Real => value.is_number(),
            ColumnKind::Text | ColumnKind::Timestamp => value.is_string(),
            ColumnKind::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Real => "number",
            ColumnKind::Text | ColumnKind::Timestamp => "string",
            ColumnKind::Boolean => "boolean",
        };
        write!(f, "{}", name)
    }
}

fn received(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub auto_increment: bool,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            primary_key: false,
            auto_increment: false,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Real)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Boolean)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Timestamp)
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Mark as an auto-increment primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.auto_increment = true;
        self
    }

    fn has_insert_default(&self) -> bool {
        self.auto_increment
            || (self.kind == ColumnKind::Timestamp
                && AUTO_TIMESTAMP_COLUMNS.contains(&self.name.as_str()))
    }
}

/// A stored collection and its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key(&self) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.primary_key)
    }

    /// Strict schema for stored rows
    pub fn select_schema(&self) -> ObjectSchema {
        let fields = self
            .columns
            .iter()
            .map(|column| FieldSpec::new(column, true))
            .collect();
        ObjectSchema {
            fields,
            strict: true,
            forbidden: Vec::new(),
        }
    }

    /// Schema for create payloads
    ///
    /// Nullable columns and columns with a default may be omitted. The
    /// auto-increment key is dropped if supplied; `createdAt`/`updatedAt`
    /// are normalized to RFC 3339 and default to now.
    pub fn insert_schema(
        &self,
        rules: &IndexMap<String, Vec<FieldRule>>,
    ) -> Result<ObjectSchema, ConfigError> {
        let rule_sets = self.build_rules(rules)?;
        let mut fields = Vec::new();

        for column in &self.columns {
            if column.auto_increment {
                continue;
            }
            let mut spec = FieldSpec::new(column, !column.nullable && !column.has_insert_default());
            spec.apply_rules(column, rule_sets.get(&column.name));
            if column.has_insert_default() {
                spec.default = Some(filters::now as fn() -> Value);
            }
            fields.push(spec);
        }

        Ok(ObjectSchema {
            fields,
            strict: false,
            forbidden: Vec::new(),
        })
    }

    /// Schema for partial updates; the primary key is rejected
    pub fn update_schema(
        &self,
        rules: &IndexMap<String, Vec<FieldRule>>,
    ) -> Result<ObjectSchema, ConfigError> {
        let rule_sets = self.build_rules(rules)?;
        let mut fields = Vec::new();
        let mut forbidden = Vec::new();

        for column in &self.columns {
            if column.primary_key {
                forbidden.push(column.name.clone());
                continue;
            }
            let mut spec = FieldSpec::new(column, false);
            spec.apply_rules(column, rule_sets.get(&column.name));
            fields.push(spec);
        }

        Ok(ObjectSchema {
            fields,
            strict: false,
            forbidden,
        })
    }

    /// `{ data: [item], count }` envelope for list responses
    pub fn collection_schema(&self, item: ObjectSchema) -> CollectionSchema {
        CollectionSchema { item }
    }

    fn build_rules(
        &self,
        rules: &IndexMap<String, Vec<FieldRule>>,
    ) -> Result<IndexMap<String, RuleSet>, ConfigError> {
        let mut built = IndexMap::new();
        for (field, list) in rules {
            if self.column(field).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: format!("{}.validation_rules", self.name),
                    value: field.clone(),
                    message: format!("table '{}' has no such column", self.name),
                });
            }
            built.insert(field.clone(), build_all(list)?);
        }
        Ok(built)
    }
}

#[derive(Clone)]
struct FieldSpec {
    name: String,
    kind: ColumnKind,
    nullable: bool,
    required: bool,
    default: Option<fn() -> Value>,
    filters: Vec<Filter>,
    validators: Vec<Validator>,
}

impl FieldSpec {
    fn new(column: &ColumnDef, required: bool) -> Self {
        Self {
            name: column.name.clone(),
            kind: column.kind,
            nullable: column.nullable,
            required,
            default: None,
            filters: Vec::new(),
            validators: Vec::new(),
        }
    }

    /// Configured filters first, then timestamp normalization, then checks
    fn apply_rules(&mut self, column: &ColumnDef, rules: Option<&RuleSet>) {
        if let Some(rules) = rules {
            self.filters.extend(rules.filters.iter().cloned());
            self.validators.extend(rules.validators.iter().cloned());
        }
        if column.kind == ColumnKind::Timestamp {
            self.filters.push(Arc::new(filters::timestamp()));
        }
    }

    fn check(&self, path: &str, value: Value, violations: &mut Violations) -> Option<Value> {
        if value.is_null() && self.nullable {
            return Some(value);
        }

        let mut value = value;
        for filter in &self.filters {
            match filter(&self.name, value) {
                Ok(next) => value = next,
                Err(e) => {
                    violations.add(path, e.to_string());
                    return None;
                }
            }
        }

        if !self.kind.accepts(&value) {
            violations.add(
                path,
                format!("Expected {}, received {}", self.kind, received(&value)),
            );
            return None;
        }

        let before = violations.len();
        for validator in &self.validators {
            if let Err(message) = validator(&self.name, &value) {
                violations.add(path, message);
            }
        }
        (violations.len() == before).then_some(value)
    }
}

/// A JSON object schema built from column definitions
#[derive(Clone)]
pub struct ObjectSchema {
    fields: Vec<FieldSpec>,
    strict: bool,
    forbidden: Vec<String>,
}

impl ObjectSchema {
    /// Names of the fields this schema knows, in column order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    fn parse_at(&self, prefix: &str, input: Value, violations: &mut Violations) -> Map<String, Value> {
        let mut output = Map::new();
        let mut object = match input {
            Value::Object(object) => object,
            other => {
                violations.add(prefix, format!("Expected object, received {}", received(&other)));
                return output;
            }
        };

        for name in &self.forbidden {
            if object.remove(name).is_some() {
                violations.add(join_path(prefix, name), format!("'{}' cannot be changed", name));
            }
        }

        for field in &self.fields {
            let path = join_path(prefix, &field.name);
            let value = match object.remove(&field.name) {
                Some(Value::Null) if field.default.is_some() && !field.nullable => None,
                other => other,
            };
            let value = match (value, field.default) {
                (Some(value), _) => value,
                (None, Some(default)) => default(),
                (None, None) if field.required => {
                    violations.add(path, "Required");
                    continue;
                }
                (None, None) => continue,
            };
            if let Some(checked) = field.check(&path, value, violations) {
                output.insert(field.name.clone(), checked);
            }
        }

        if self.strict {
            for key in object.keys() {
                violations.add(join_path(prefix, key), "Unrecognized key");
            }
        }

        output
    }
}

impl Schema for ObjectSchema {
    type Output = Map<String, Value>;

    fn parse(&self, input: Value) -> Result<Self::Output, Violations> {
        let mut violations = Violations::new();
        let output = self.parse_at("", input, &mut violations);
        violations.into_result(output)
    }
}

/// Strict `{ data: [item], count: number }` envelope
#[derive(Clone)]
pub struct CollectionSchema {
    item: ObjectSchema,
}

impl Schema for CollectionSchema {
    type Output = Value;

    fn parse(&self, input: Value) -> Result<Value, Violations> {
        let mut violations = Violations::new();
        let mut object = match input {
            Value::Object(object) => object,
            other => {
                return Err(Violations::single(
                    "",
                    format!("Expected object, received {}", received(&other)),
                ));
            }
        };

        let mut data = Vec::new();
        match object.remove("data") {
            Some(Value::Array(items)) => {
                for (index, item) in items.into_iter().enumerate() {
                    let prefix = format!("data.{}", index);
                    data.push(Value::Object(self.item.parse_at(&prefix, item, &mut violations)));
                }
            }
            Some(other) => violations.add(
                "data",
                format!("Expected array, received {}", received(&other)),
            ),
            None => violations.add("data", "Required"),
        }

        let count = match object.remove("count") {
            Some(count) if count.is_number() => count,
            Some(other) => {
                violations.add(
                    "count",
                    format!("Expected number, received {}", received(&other)),
                );
                Value::Null
            }
            None => {
                violations.add("count", "Required");
                Value::Null
            }
        };

        for key in object.keys() {
            violations.add(key.as_str(), "Unrecognized key");
        }

        violations.into_result(serde_json::json!({ "data": data, "count": count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> TableDef {
        TableDef::new(
            "users",
            vec![
                ColumnDef::integer("id").primary_key(),
                ColumnDef::text("name").nullable(),
                ColumnDef::text("email").nullable(),
                ColumnDef::timestamp("createdAt"),
                ColumnDef::timestamp("updatedAt"),
            ],
        )
    }

    fn email_rule() -> IndexMap<String, Vec<FieldRule>> {
        let mut rules = IndexMap::new();
        rules.insert(
            "email".to_string(),
            vec![FieldRule::Email {
                message: Some("Invalid email address".to_string()),
            }],
        );
        rules
    }

    fn paths(violations: &Violations) -> Vec<String> {
        violations.iter().map(|v| v.path.clone()).collect()
    }

    #[test]
    fn test_select_schema_accepts_stored_row() {
        let row = json!({
            "id": 1,
            "name": "Ada",
            "email": null,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z"
        });
        let parsed = users().select_schema().parse(row).unwrap();
        assert_eq!(parsed["id"], json!(1));
        assert_eq!(parsed["email"], json!(null));
    }

    #[test]
    fn test_select_schema_is_strict() {
        let row = json!({
            "id": 1,
            "name": "Ada",
            "email": "ada@example.com",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "password": "secret"
        });
        let err = users().select_schema().parse(row).unwrap_err();
        assert_eq!(paths(&err), vec!["updatedAt", "password"]);
        assert_eq!(err.as_slice()[1].message, "Unrecognized key");
    }

    #[test]
    fn test_select_schema_type_mismatch() {
        let row = json!({
            "id": "1",
            "name": "Ada",
            "email": null,
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:00.000Z"
        });
        let err = users().select_schema().parse(row).unwrap_err();
        assert_eq!(err.as_slice()[0].path, "id");
        assert_eq!(err.as_slice()[0].message, "Expected integer, received string");
    }

    #[test]
    fn test_insert_schema_defaults_timestamps_and_drops_id() {
        let schema = users().insert_schema(&IndexMap::new()).unwrap();
        let parsed = schema
            .parse(json!({ "id": 99, "name": "Ada", "extra": true }))
            .unwrap();

        assert!(!parsed.contains_key("id"));
        assert!(!parsed.contains_key("extra"));
        assert!(!parsed.contains_key("email"));
        assert!(parsed["createdAt"].as_str().unwrap().ends_with('Z'));
        assert!(parsed["updatedAt"].is_string());
    }

    #[test]
    fn test_insert_schema_normalizes_supplied_timestamp() {
        let schema = users().insert_schema(&IndexMap::new()).unwrap();
        let parsed = schema
            .parse(json!({ "createdAt": "2024-05-01 10:00:00", "updatedAt": null }))
            .unwrap();
        assert_eq!(parsed["createdAt"], json!("2024-05-01T10:00:00.000Z"));
        assert!(parsed["updatedAt"].is_string());
    }

    #[test]
    fn test_insert_schema_applies_rules() {
        let schema = users().insert_schema(&email_rule()).unwrap();
        let err = schema.parse(json!({ "email": "not-an-email" })).unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.as_slice()[0].path, "email");
        assert_eq!(err.as_slice()[0].message, "Invalid email address");
    }

    #[test]
    fn test_trim_and_lowercase_rules_normalize_before_checks() {
        let mut rules = email_rule();
        rules.insert(
            "email".to_string(),
            vec![
                FieldRule::Trim,
                FieldRule::Lowercase,
                FieldRule::Email { message: None },
            ],
        );

        let insert = users().insert_schema(&rules).unwrap();
        let parsed = insert.parse(json!({ "email": "  Ada@Example.COM " })).unwrap();
        assert_eq!(parsed["email"], json!("ada@example.com"));

        let update = users().update_schema(&rules).unwrap();
        let parsed = update.parse(json!({ "email": " Grace@Example.com" })).unwrap();
        assert_eq!(parsed["email"], json!("grace@example.com"));
    }

    #[test]
    fn test_insert_schema_requires_non_nullable_columns() {
        let table = TableDef::new(
            "posts",
            vec![
                ColumnDef::integer("id").primary_key(),
                ColumnDef::text("title"),
                ColumnDef::boolean("published"),
            ],
        );
        let err = table
            .insert_schema(&IndexMap::new())
            .unwrap()
            .parse(json!({ "published": "yes" }))
            .unwrap_err();
        assert_eq!(paths(&err), vec!["title", "published"]);
        assert_eq!(err.as_slice()[0].message, "Required");
    }

    #[test]
    fn test_insert_schema_rejects_non_object() {
        let schema = users().insert_schema(&IndexMap::new()).unwrap();
        let err = schema.parse(json!(null)).unwrap_err();
        assert_eq!(err.as_slice()[0].path, "");
        assert_eq!(err.as_slice()[0].message, "Expected object, received null");
    }

    #[test]
    fn test_update_schema_everything_optional() {
        let schema = users().update_schema(&email_rule()).unwrap();
        assert_eq!(schema.parse(json!({})).unwrap(), Map::new());

        let parsed = schema.parse(json!({ "name": "Grace" })).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["name"], json!("Grace"));
    }

    #[test]
    fn test_update_schema_rejects_primary_key() {
        let schema = users().update_schema(&IndexMap::new()).unwrap();
        let err = schema.parse(json!({ "id": 5, "name": "x" })).unwrap_err();
        assert_eq!(paths(&err), vec!["id"]);
    }

    #[test]
    fn test_rules_for_unknown_column_fail() {
        let mut rules = IndexMap::new();
        rules.insert("phone".to_string(), vec![FieldRule::Positive { message: None }]);
        assert!(matches!(
            users().insert_schema(&rules),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_collection_schema() {
        let table = users();
        let schema = table.collection_schema(table.select_schema());
        let ok = json!({
            "data": [{
                "id": 1,
                "name": null,
                "email": null,
                "createdAt": "2024-01-01T00:00:00.000Z",
                "updatedAt": "2024-01-01T00:00:00.000Z"
            }],
            "count": 1
        });
        assert!(schema.parse(ok).is_ok());

        let err = schema
            .parse(json!({ "data": [{ "id": 1 }], "count": "1", "page": 1 }))
            .unwrap_err();
        let got = paths(&err);
        assert!(got.contains(&"data.0.createdAt".to_string()));
        assert!(got.contains(&"count".to_string()));
        assert!(got.contains(&"page".to_string()));
    }
}
