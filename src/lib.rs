//! # crudkit
//!
//! Runtime layer for scaffolded CRUD backends built on axum.
//!
//! ## Features
//!
//! - **Validated handlers**: body, path params and query parsed through
//!   schemas before the handler runs, responses checked before they leave
//! - **Table queries**: paginated, filterable, sortable list endpoints with
//!   opaque store-specific filter predicates
//! - **Table-derived schemas**: select, insert and update shapes built from
//!   column definitions plus configured field rules
//! - **Configuration-Based**: enabled collections and their rules in YAML
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crudkit::prelude::*;
//!
//! let users = InMemoryTable::<Map<String, Value>>::new("users", "id");
//!
//! let list_users = BaseEventHandler::builder().handler(move |ctx: ValidatedContext| {
//!     let users = users.clone();
//!     async move {
//!         let users = &users;
//!         let page = TableQuery::new(&ctx.raw_query)
//!             .search_filter(|s| Some(Condition::contains_any(&["name", "email"], s)))
//!             .run(
//!                 || users.fetch(&[]),
//!                 |filters| async move { users.count(&filters).await },
//!             )
//!             .await?;
//!         Ok(page)
//!     }
//! });
//!
//! let app = ServerBuilder::new()
//!     .with_routes(Router::new().route("/api/v1/users", get(list_users)))
//!     .build()?;
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        error::{CrudError, CrudResult, EntityError, RequestError, StorageError, ValidationError},
        field::{FieldValue, TableRow},
        handler::{BaseEventHandler, RawRequest, Reply, ValidatedContext},
        query::{PageResult, QueryParams, SortDirection, TableQuerySettings},
        schema::{Schema, Typed, Violation, Violations, schema_fn},
        store::TableStore,
        table_query::{TableQuery, run_table_query},
        validation::{ColumnDef, ColumnKind, FieldRule, TableDef},
    };

    // === Macros ===
    pub use crate::impl_table_row;

    // === Storage ===
    pub use crate::storage::{Condition, InMemoryTable};

    // === Config ===
    pub use crate::config::{CollectionConfig, CrudConfig};

    // === Server ===
    pub use crate::server::{ServerBuilder, init_tracing};

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Map, Value, json};

    // === Axum ===
    pub use axum::{
        Router,
        http::StatusCode,
        routing::{delete, get, patch, post},
    };
}
