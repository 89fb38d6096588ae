//! Validation and filtering system
//!
//! Declarative field rules, value filters and the object schemas derived
//! from table definitions.

pub mod filters;
pub mod rules;
pub mod table;

pub use rules::{CompiledRule, FieldRule, RuleSet, Validator};
pub use table::{CollectionSchema, ColumnDef, ColumnKind, ObjectSchema, TableDef};
