//! Store trait for table-backed collections

use crate::core::error::CrudResult;
use crate::core::field::TableRow;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// A collection of rows addressed by an integer primary key
///
/// Implementations decide how filter predicates are evaluated; callers only
/// build them and hand them back. `fetch` and `count` must agree on which
/// rows a set of filters selects.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Row type returned by every read
    type Row: TableRow + Send + Sync;

    /// Opaque filter predicate
    type Filter: Send + Sync;

    /// Rows matching every filter
    async fn fetch(&self, filters: &[Self::Filter]) -> CrudResult<Vec<Self::Row>>;

    /// Number of rows matching every filter
    async fn count(&self, filters: &[Self::Filter]) -> CrudResult<u64>;

    /// Get a row by primary key
    async fn get(&self, id: i64) -> CrudResult<Option<Self::Row>>;

    /// Insert a row, assigning its primary key
    async fn insert(&self, values: Map<String, Value>) -> CrudResult<Self::Row>;

    /// Apply changes to a row; `None` when no row has this key
    async fn update(&self, id: i64, changes: Map<String, Value>) -> CrudResult<Option<Self::Row>>;

    /// Remove a row, returning it; `None` when no row has this key
    async fn delete(&self, id: i64) -> CrudResult<Option<Self::Row>>;
}
