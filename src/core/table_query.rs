//! Paginated, filterable, sortable table queries
//!
//! [`TableQuery`] turns raw [`QueryParams`] into one [`PageResult`]. The
//! caller supplies two collaborators:
//!
//! - `count_rows` receives every filter predicate built from the request and
//!   returns the number of matching rows. This is the source of `totalItems`.
//! - `fetch_rows` returns the candidate rows. It may push some or all of the
//!   filters down to the store; the engine does not assume either way.
//!
//! Filter predicates are opaque (`F`): the engine only collects them.
//! Sorting and pagination run in memory over whatever `fetch_rows` returned,
//! so a fetch that returns fewer rows than `totalItems` yields incomplete
//! later pages.
//!
//! # Example
//!
//! ```rust,ignore
//! let page = TableQuery::new(&params)
//!     .search_filter(|search| Some(Condition::contains_any(&["name", "email"], search)))
//!     .custom_filter("status", |value| Some(Condition::eq("status", value)))
//!     .run(
//!         || store.fetch(&pushed_down),
//!         |filters| async move { store.count(&filters).await },
//!     )
//!     .await?;
//! ```

use crate::core::error::QueryError;
use crate::core::field::{FieldValue, TableRow};
use crate::core::query::{PageResult, QueryParams, SortDirection, TableQueryParams, TableQuerySettings};
use std::cmp::Ordering;
use std::future::Future;

/// Maps a query-string value to a filter predicate, or `None` for no predicate
pub type FilterBuilder<'a, F> = Box<dyn Fn(&str) -> Option<F> + Send + Sync + 'a>;

/// A single table query over request parameters
pub struct TableQuery<'a, F> {
    params: &'a QueryParams,
    settings: TableQuerySettings,
    search_filter: Option<FilterBuilder<'a, F>>,
    custom_filters: Vec<(String, FilterBuilder<'a, F>)>,
}

impl<'a, F> TableQuery<'a, F> {
    pub fn new(params: &'a QueryParams) -> Self {
        Self {
            params,
            settings: TableQuerySettings::default(),
            search_filter: None,
            custom_filters: Vec::new(),
        }
    }

    /// Use configured page-size defaults and bounds
    pub fn with_settings(mut self, settings: TableQuerySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Push free-text search down to the store
    ///
    /// The builder receives the trimmed, lower-cased search text. Supplying
    /// a builder disables the in-memory search fallback even when the
    /// builder returns `None`.
    pub fn search_filter(mut self, builder: impl Fn(&str) -> Option<F> + Send + Sync + 'a) -> Self {
        self.search_filter = Some(Box::new(builder));
        self
    }

    /// Build a predicate from the query parameter `key` when it is non-empty
    ///
    /// Custom filters are applied in registration order.
    pub fn custom_filter(
        mut self,
        key: impl Into<String>,
        builder: impl Fn(&str) -> Option<F> + Send + Sync + 'a,
    ) -> Self {
        self.custom_filters.push((key.into(), Box::new(builder)));
        self
    }

    /// Whether a search builder was supplied
    pub fn has_search_filter(&self) -> bool {
        self.search_filter.is_some()
    }

    /// Normalize the request parameters with this query's settings
    pub fn normalized(&self) -> Result<TableQueryParams, QueryError> {
        TableQueryParams::from_params(self.params, &self.settings)
    }

    /// Collect the filter predicates for the given normalized parameters
    pub fn build_filters(&self, normalized: &TableQueryParams) -> Vec<F> {
        let mut filters = Vec::new();

        if !normalized.search.is_empty() {
            if let Some(builder) = &self.search_filter {
                if let Some(filter) = builder(&normalized.search.to_lowercase()) {
                    filters.push(filter);
                }
            }
        }

        for (key, builder) in &self.custom_filters {
            let value = self.params.value_or(key, "");
            if value.is_empty() {
                continue;
            }
            if let Some(filter) = builder(value) {
                filters.push(filter);
            }
        }

        filters
    }

    /// Run the query
    ///
    /// Failures of `count_rows` or `fetch_rows` are returned unchanged. The
    /// only error raised here is [`QueryError::InvalidPageSize`].
    pub async fn run<T, E, Fetch, FetchFut, Count, CountFut>(
        self,
        fetch_rows: Fetch,
        count_rows: Count,
    ) -> Result<PageResult<T>, E>
    where
        T: TableRow,
        E: From<QueryError>,
        Fetch: FnOnce() -> FetchFut,
        FetchFut: Future<Output = Result<Vec<T>, E>>,
        Count: FnOnce(Vec<F>) -> CountFut,
        CountFut: Future<Output = Result<u64, E>>,
    {
        let normalized = self.normalized()?;
        let filters = self.build_filters(&normalized);
        let filter_count = filters.len();
        let search_pushed_down = self.has_search_filter();

        let total_items = count_rows(filters).await?;
        let mut rows = fetch_rows().await?;

        if !normalized.search.is_empty() && !search_pushed_down {
            retain_matching(&mut rows, &normalized.search);
        }

        if !normalized.sort_by.is_empty() && !rows.is_empty() {
            rows = sort_rows(rows, &normalized.sort_by, normalized.sort_dir);
        }

        let offset = usize::try_from(normalized.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(normalized.page_size).unwrap_or(usize::MAX);
        let data: Vec<T> = rows.into_iter().skip(offset).take(take).collect();

        tracing::debug!(
            page = normalized.page,
            page_size = normalized.page_size,
            filters = filter_count,
            total_items,
            returned = data.len(),
            "table query completed"
        );

        Ok(PageResult::new(
            data,
            total_items,
            normalized.page,
            normalized.page_size,
        )?)
    }
}

/// Run a table query from its parts
///
/// Equivalent to building a [`TableQuery`] with the given search builder and
/// custom filters, in order, then calling [`TableQuery::run`].
pub async fn run_table_query<'a, T, F, E, Fetch, FetchFut, Count, CountFut>(
    params: &'a QueryParams,
    fetch_rows: Fetch,
    count_rows: Count,
    search_filter: Option<FilterBuilder<'a, F>>,
    custom_filters: Vec<(String, FilterBuilder<'a, F>)>,
) -> Result<PageResult<T>, E>
where
    T: TableRow,
    E: From<QueryError>,
    Fetch: FnOnce() -> FetchFut,
    FetchFut: Future<Output = Result<Vec<T>, E>>,
    Count: FnOnce(Vec<F>) -> CountFut,
    CountFut: Future<Output = Result<u64, E>>,
{
    let query = TableQuery {
        params,
        settings: TableQuerySettings::default(),
        search_filter,
        custom_filters,
    };
    query.run(fetch_rows, count_rows).await
}

/// Keep rows where some field's text contains `search`, ignoring case
fn retain_matching<T: TableRow>(rows: &mut Vec<T>, search: &str) {
    let needle = search.to_lowercase();
    rows.retain(|row| {
        row.field_values().iter().any(|value| {
            value
                .search_text()
                .is_some_and(|text| text.to_lowercase().contains(&needle))
        })
    });
}

/// Stable sort with null or missing values last in either direction
fn sort_rows<T: TableRow>(rows: Vec<T>, sort_by: &str, direction: SortDirection) -> Vec<T> {
    let mut keyed: Vec<(Option<FieldValue>, T)> = rows
        .into_iter()
        .map(|row| {
            let key = row
                .field(sort_by)
                .filter(|value| !value.is_null() && !value.is_nan());
            (key, row)
        })
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_sort_keys(a.as_ref(), b.as_ref(), direction));
    keyed.into_iter().map(|(_, row)| row).collect()
}

fn compare_sort_keys(
    a: Option<&FieldValue>,
    b: Option<&FieldValue>,
    direction: SortDirection,
) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match direction {
            SortDirection::Asc => a.compare(b),
            SortDirection::Desc => a.compare(b).reverse(),
        },
    }
}
