//! Schemas: the parse-or-fail capability used for bodies, params, queries and responses
//!
//! A [`Schema`] turns an untrusted JSON value into a typed output or a
//! [`Violations`] list naming every offending path. The validation wrapper
//! uses the same trait for all four request/response sections.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// A capability that parses a candidate value or reports why it cannot
pub trait Schema: Send + Sync + 'static {
    /// The value produced by a successful parse
    type Output: Send + 'static;

    /// Parse `input`, returning every violation found on failure
    fn parse(&self, input: Value) -> Result<Self::Output, Violations>;
}

impl<S: Schema> Schema for Arc<S> {
    type Output = S::Output;

    fn parse(&self, input: Value) -> Result<Self::Output, Violations> {
        (**self).parse(input)
    }
}

/// A single field violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Dotted path to the offending value (`""` for the root)
    pub path: String,
    /// What is wrong with it
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// An ordered list of violations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// A list holding exactly one violation
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self(vec![Violation::new(path, message)])
    }

    pub fn push(&mut self, violation: Violation) {
        self.0.push(violation);
    }

    pub fn add(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.0.push(Violation::new(path, message));
    }

    pub fn extend(&mut self, other: Violations) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Violation] {
        &self.0
    }

    /// `Ok(value)` when nothing was recorded, otherwise `Err(self)`
    pub fn into_result<T>(self, value: T) -> Result<T, Violations> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    /// Flatten `validator` errors into dotted-path violations, sorted by path
    pub fn from_validation_errors(errors: &ValidationErrors) -> Self {
        let mut out = Vec::new();
        collect_validation_errors("", errors, &mut out);
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Self(out)
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(list: Vec<Violation>) -> Self {
        Self(list)
    }
}

impl From<ValidationErrors> for Violations {
    fn from(errors: ValidationErrors) -> Self {
        Self::from_validation_errors(&errors)
    }
}

impl IntoIterator for Violations {
    type Item = Violation;
    type IntoIter = std::vec::IntoIter<Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Join a parent path and a child segment with a dot
pub(crate) fn join_path(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", prefix, segment)
    }
}

fn collect_validation_errors(prefix: &str, errors: &ValidationErrors, out: &mut Vec<Violation>) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, &field.to_string());
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", err.code));
                    out.push(Violation::new(path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                collect_validation_errors(&path, inner, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_validation_errors(&join_path(&path, &index.to_string()), inner, out);
                }
            }
        }
    }
}

/// Best-effort field path for a serde deserialization error
fn serde_error_path(message: &str) -> String {
    for prefix in ["missing field `", "unknown field `", "duplicate field `"] {
        if let Some(rest) = message.strip_prefix(prefix) {
            if let Some(end) = rest.find('`') {
                return rest[..end].to_string();
            }
        }
    }
    String::new()
}

/// Schema backed by a Rust type: serde shapes it, `validator` checks it
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Deserialize, Validate)]
/// struct CreateUser {
///     #[validate(email(message = "Invalid email address"))]
///     email: String,
/// }
///
/// let schema = Typed::<CreateUser>::new();
/// ```
pub struct Typed<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Typed<{}>", std::any::type_name::<T>())
    }
}

impl<T> Schema for Typed<T>
where
    T: DeserializeOwned + Validate + Send + 'static,
{
    type Output = T;

    fn parse(&self, input: Value) -> Result<T, Violations> {
        let value: T = serde_json::from_value(input).map_err(|e| {
            let message = e.to_string();
            Violations::single(serde_error_path(&message), message)
        })?;
        value
            .validate()
            .map_err(|errors| Violations::from_validation_errors(&errors))?;
        Ok(value)
    }
}

/// Schema from a plain function
pub struct FnSchema<F>(F);

/// Build a schema from a closure
pub fn schema_fn<F, T>(f: F) -> FnSchema<F>
where
    F: Fn(Value) -> Result<T, Violations> + Send + Sync + 'static,
    T: Send + 'static,
{
    FnSchema(f)
}

impl<F, T> Schema for FnSchema<F>
where
    F: Fn(Value) -> Result<T, Violations> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn parse(&self, input: Value) -> Result<T, Violations> {
        (self.0)(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, Validate)]
    struct Address {
        #[validate(length(min = 1, message = "City is required"))]
        city: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Signup {
        #[validate(email(message = "Invalid email address"))]
        email: String,
        #[validate(length(min = 2))]
        name: String,
        #[validate(nested)]
        address: Address,
    }

    #[test]
    fn test_typed_accepts_valid_input() {
        let schema = Typed::<Signup>::new();
        let parsed = schema
            .parse(json!({
                "email": "ada@example.com",
                "name": "Ada",
                "address": { "city": "London" }
            }))
            .expect("valid input should parse");
        assert_eq!(parsed.email, "ada@example.com");
        assert_eq!(parsed.address.city, "London");
    }

    #[test]
    fn test_typed_reports_missing_field_path() {
        let schema = Typed::<Signup>::new();
        let err = schema
            .parse(json!({ "name": "Ada", "address": { "city": "X" } }))
            .unwrap_err();
        assert_eq!(err.len(), 1);
        assert_eq!(err.as_slice()[0].path, "email");
        assert!(err.as_slice()[0].message.contains("missing field"));
    }

    #[test]
    fn test_typed_flattens_nested_validation_errors() {
        let schema = Typed::<Signup>::new();
        let err = schema
            .parse(json!({
                "email": "not-an-email",
                "name": "A",
                "address": { "city": "" }
            }))
            .unwrap_err();

        let paths: Vec<&str> = err.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["address.city", "email", "name"]);
        assert_eq!(err.as_slice()[0].message, "City is required");
        assert_eq!(err.as_slice()[1].message, "Invalid email address");
        assert!(err.as_slice()[2].message.contains("length"));
    }

    #[test]
    fn test_fn_schema() {
        let schema = schema_fn(|value: Value| match value.as_i64() {
            Some(n) if n > 0 => Ok(n),
            _ => Err(Violations::single("", "Expected a positive integer")),
        });
        assert_eq!(schema.parse(json!(3)).unwrap(), 3);
        assert!(schema.parse(json!(-1)).is_err());
    }

    #[test]
    fn test_violations_display_and_result() {
        let mut violations = Violations::new();
        assert_eq!(violations.clone().into_result(1), Ok(1));

        violations.add("email", "Invalid email address");
        violations.add("items.0.qty", "Too small");
        assert_eq!(
            violations.to_string(),
            "email: Invalid email address, items.0.qty: Too small"
        );
        assert!(violations.into_result(()).is_err());
    }

    #[test]
    fn test_serde_error_path() {
        assert_eq!(serde_error_path("missing field `email`"), "email");
        assert_eq!(serde_error_path("unknown field `admin`, expected one of"), "admin");
        assert_eq!(serde_error_path("invalid type: null"), "");
    }
}
