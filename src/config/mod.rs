//! Configuration loading and management

use crate::core::error::ConfigError;
use crate::core::query::TableQuerySettings;
use crate::core::validation::FieldRule;
use anyhow::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for one collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Fields shown in list views, in display order
    #[serde(default)]
    pub visible_fields: Vec<String>,

    /// Extra validation rules per field, applied to insert and update payloads
    #[serde(default)]
    pub validation_rules: IndexMap<String, Vec<FieldRule>>,
}

/// Complete configuration for the CRUD runtime
///
/// ```yaml
/// collections: [users]
/// config:
///   users:
///     visible_fields: [id, name, email]
///     validation_rules:
///       email:
///         - rule: email
///           message: Invalid email address
/// table_query:
///   default_page_size: 10
///   max_page_size: 100
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrudConfig {
    /// Enabled collections
    #[serde(default)]
    pub collections: Vec<String>,

    /// Per-collection configuration
    #[serde(default)]
    pub config: IndexMap<String, CollectionConfig>,

    /// Page-size defaults for list endpoints
    #[serde(default)]
    pub table_query: TableQuerySettings,
}

impl CrudConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("{}: {}", path.display(), e),
        })?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            file: Some(path.display().to_string()),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every enabled collection is configured and page sizes are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        for collection in &self.collections {
            if !self.config.contains_key(collection) {
                return Err(ConfigError::MissingCollection {
                    collection: collection.clone(),
                });
            }
        }

        if self.table_query.default_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "table_query.default_page_size".to_string(),
                value: "0".to_string(),
                message: "page size must be positive".to_string(),
            });
        }
        if self.table_query.max_page_size == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "table_query.max_page_size".to_string(),
                value: "0".to_string(),
                message: "page size must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Configuration of an enabled collection
    pub fn collection(&self, name: &str) -> Result<&CollectionConfig, ConfigError> {
        if !self.is_enabled(name) {
            return Err(ConfigError::MissingCollection {
                collection: name.to_string(),
            });
        }
        self.config
            .get(name)
            .ok_or_else(|| ConfigError::MissingCollection {
                collection: name.to_string(),
            })
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.collections.iter().any(|c| c == name)
    }

    /// Available tables that are enabled, in the order they are available
    pub fn enabled_collections<'a, I>(&self, available: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        available
            .into_iter()
            .filter(|name| self.is_enabled(name))
            .collect()
    }

    /// Visible fields of a collection; empty when not configured
    pub fn visible_fields(&self, name: &str) -> &[String] {
        self.config
            .get(name)
            .map(|c| c.visible_fields.as_slice())
            .unwrap_or_default()
    }

    /// Validation rules of a collection
    pub fn validation_rules(&self, name: &str) -> Result<&IndexMap<String, Vec<FieldRule>>, ConfigError> {
        Ok(&self.collection(name)?.validation_rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
collections: [users, posts]
config:
  users:
    visible_fields: [id, name, email]
    validation_rules:
      email:
        - rule: email
          message: Invalid email address
  posts:
    visible_fields: [title]
table_query:
  default_page_size: 20
  max_page_size: 50
"#;

    #[test]
    fn test_from_yaml_str() {
        let config = CrudConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.collections, vec!["users", "posts"]);
        assert_eq!(config.visible_fields("users"), ["id", "name", "email"]);
        assert_eq!(config.table_query.default_page_size, 20);
        assert_eq!(config.table_query.max_page_size, Some(50));

        let rules = config.validation_rules("users").unwrap();
        assert_eq!(rules["email"].len(), 1);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = CrudConfig::from_yaml_str("collections: []").unwrap();
        assert!(config.config.is_empty());
        assert_eq!(config.table_query, TableQuerySettings::default());
    }

    #[test]
    fn test_enabled_collections_keeps_available_order() {
        let config = CrudConfig::from_yaml_str(YAML).unwrap();
        let enabled = config.enabled_collections(["posts", "comments", "users"]);
        assert_eq!(enabled, vec!["posts", "users"]);
    }

    #[test]
    fn test_unknown_collection() {
        let config = CrudConfig::from_yaml_str(YAML).unwrap();
        assert!(matches!(
            config.collection("comments"),
            Err(ConfigError::MissingCollection { .. })
        ));
        assert!(config.visible_fields("comments").is_empty());
    }

    #[test]
    fn test_enabled_collection_without_config_is_rejected() {
        let err = CrudConfig::from_yaml_str("collections: [users]").unwrap_err();
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let yaml = "table_query:\n  default_page_size: 0\n";
        assert!(CrudConfig::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = CrudConfig::from_yaml_str(YAML).unwrap();
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(CrudConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
