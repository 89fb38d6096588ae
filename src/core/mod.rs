//! Core module containing the validation wrapper, the table query engine
//! and the types they share

pub mod error;
pub mod extractors;
pub mod field;
pub mod handler;
pub mod query;
pub mod schema;
pub mod store;
pub mod table_query;
pub mod validation;

pub use error::{CrudError, CrudResult};
pub use field::{FieldValue, TableRow};
pub use handler::{BaseEventHandler, EventHandler, RawRequest, Reply, ValidatedContext};
pub use query::{PageResult, QueryParams, SortDirection, TableQueryParams, TableQuerySettings};
pub use schema::{Schema, Typed, Violation, Violations};
pub use store::TableStore;
pub use table_query::{TableQuery, run_table_query};
