//! Reusable field validators
//!
//! Each validator checks one field value and returns a human-readable
//! message on failure. Values of a type a validator does not understand
//! pass through; type checks belong to the column schema.

use super::filters::{self, Filter};
use crate::core::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use validator::ValidateEmail;

/// A boxed field validator
pub type Validator = Arc<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

/// A declarative validation rule, as written in configuration
///
/// ```yaml
/// validation_rules:
///   email:
///     - rule: trim
///     - rule: lowercase
///     - rule: email
///       message: Invalid email address
///   name:
///     - rule: min_length
///       value: 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
    /// Strip surrounding whitespace before the checks run
    Trim,
    /// Lower-case the value before the checks run
    Lowercase,
    Email {
        #[serde(default)]
        message: Option<String>,
    },
    MinLength {
        value: usize,
        #[serde(default)]
        message: Option<String>,
    },
    MaxLength {
        value: usize,
        #[serde(default)]
        message: Option<String>,
    },
    Pattern {
        regex: String,
        #[serde(default)]
        message: Option<String>,
    },
    Positive {
        #[serde(default)]
        message: Option<String>,
    },
    Max {
        value: f64,
        #[serde(default)]
        message: Option<String>,
    },
    OneOf {
        values: Vec<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// A compiled rule
#[derive(Clone)]
pub enum CompiledRule {
    /// Rewrites the value
    Filter(Filter),
    /// Rejects the value with a message
    Check(Validator),
}

/// Filters and checks for one field, each in rule order
#[derive(Clone, Default)]
pub struct RuleSet {
    pub filters: Vec<Filter>,
    pub validators: Vec<Validator>,
}

impl FieldRule {
    /// Compile the rule
    ///
    /// Fails only for a `pattern` rule whose regex does not compile.
    pub fn build(&self) -> Result<CompiledRule, ConfigError> {
        let validator: Validator = match self {
            FieldRule::Trim => return Ok(CompiledRule::Filter(Arc::new(filters::trim()))),
            FieldRule::Lowercase => {
                return Ok(CompiledRule::Filter(Arc::new(filters::lowercase())));
            }
            FieldRule::Email { message } => Arc::new(email(message.clone())),
            FieldRule::MinLength { value, message } => {
                Arc::new(min_length(*value, message.clone()))
            }
            FieldRule::MaxLength { value, message } => {
                Arc::new(max_length(*value, message.clone()))
            }
            FieldRule::Pattern { regex, message } => {
                let compiled = Regex::new(regex).map_err(|e| ConfigError::InvalidValue {
                    field: "pattern".to_string(),
                    value: regex.clone(),
                    message: e.to_string(),
                })?;
                Arc::new(pattern(compiled, message.clone()))
            }
            FieldRule::Positive { message } => Arc::new(positive(message.clone())),
            FieldRule::Max { value, message } => Arc::new(max_value(*value, message.clone())),
            FieldRule::OneOf { values, message } => {
                Arc::new(one_of(values.clone(), message.clone()))
            }
        };
        Ok(CompiledRule::Check(validator))
    }
}

/// Validator: string must be an email address
pub fn email(
    message: Option<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| match value.as_str() {
        Some(s) if !s.to_string().validate_email() => Err(message
            .clone()
            .unwrap_or_else(|| format!("'{}' must be a valid email address", field))),
        _ => Ok(()),
    }
}

/// Validator: string must have at least `min` characters
pub fn min_length(
    min: usize,
    message: Option<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if len < min {
                return Err(message.clone().unwrap_or_else(|| {
                    format!(
                        "'{}' must have at least {} characters (got {})",
                        field, min, len
                    )
                }));
            }
        }
        Ok(())
    }
}

/// Validator: string must have at most `max` characters
pub fn max_length(
    max: usize,
    message: Option<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if len > max {
                return Err(message.clone().unwrap_or_else(|| {
                    format!(
                        "'{}' must not exceed {} characters (got {})",
                        field, max, len
                    )
                }));
            }
        }
        Ok(())
    }
}

/// Validator: string must match a regular expression
pub fn pattern(
    regex: Regex,
    message: Option<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| match value.as_str() {
        Some(s) if !regex.is_match(s) => Err(message
            .clone()
            .unwrap_or_else(|| format!("'{}' does not match the expected format", field))),
        _ => Ok(()),
    }
}

/// Validator: number must be positive
pub fn positive(
    message: Option<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| match value.as_f64() {
        Some(num) if num <= 0.0 => Err(message
            .clone()
            .unwrap_or_else(|| format!("'{}' must be positive (got {})", field, num))),
        _ => Ok(()),
    }
}

/// Validator: number must not exceed maximum
pub fn max_value(
    max: f64,
    message: Option<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| match value.as_f64() {
        Some(num) if num > max => Err(message
            .clone()
            .unwrap_or_else(|| format!("'{}' must not exceed {} (got {})", field, max, num))),
        _ => Ok(()),
    }
}

/// Validator: value must be in allowed list
pub fn one_of(
    allowed: Vec<String>,
    message: Option<String>,
) -> impl Fn(&str, &Value) -> Result<(), String> + Send + Sync + Clone {
    move |field: &str, value: &Value| match value.as_str() {
        Some(s) if !allowed.iter().any(|a| a == s) => Err(message.clone().unwrap_or_else(|| {
            format!(
                "'{}' must be one of {:?} (got {})",
                field, allowed, s
            )
        })),
        _ => Ok(()),
    }
}

/// Compile a list of rules into one field's filters and checks
pub fn build_all(rules: &[FieldRule]) -> Result<RuleSet, ConfigError> {
    let mut set = RuleSet::default();
    for rule in rules {
        match rule.build()? {
            CompiledRule::Filter(filter) => set.filters.push(filter),
            CompiledRule::Check(validator) => set.validators.push(validator),
        }
    }
    Ok(set)
}
