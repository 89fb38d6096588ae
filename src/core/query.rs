//! Query parameters and pagination utilities

use crate::core::error::QueryError;
use axum::http::Uri;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Page number used when `page` is missing or unusable
pub const DEFAULT_PAGE: u64 = 1;

/// Page size used when `pageSize` is missing or unparseable
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// A query-string value: a single string, or every value of a repeated key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    One(String),
    Many(Vec<String>),
}

impl QueryValue {
    /// The first value, if any
    pub fn first(&self) -> Option<&str> {
        match self {
            QueryValue::One(s) => Some(s),
            QueryValue::Many(values) => values.first().map(String::as_str),
        }
    }

    fn push(&mut self, value: String) {
        match self {
            QueryValue::One(existing) => {
                let first = std::mem::take(existing);
                *self = QueryValue::Many(vec![first, value]);
            }
            QueryValue::Many(values) => values.push(value),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            QueryValue::One(s) => Value::String(s.clone()),
            QueryValue::Many(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
        }
    }
}

/// Raw query-string parameters
///
/// Keys keep their first-seen order; a key given more than once becomes
/// [`QueryValue::Many`].
///
/// # Example
/// ```rust,ignore
/// // GET /users?page=2&pageSize=20&search=ada&sortBy=name&sortDir=desc
/// pub async fn list_users(params: QueryParams) -> Json<PageResult<User>> {
///     // params.value("page") == Some("2")
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryParams(IndexMap<String, QueryValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from decoded key/value pairs, accumulating repeated keys
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.append(key, value);
        }
        params
    }

    /// Parse the query string of a URI
    pub fn from_uri(uri: &Uri) -> Result<Self, QueryError> {
        let axum::extract::Query(pairs) =
            axum::extract::Query::<Vec<(String, String)>>::try_from_uri(uri).map_err(|e| {
                QueryError::MalformedQuery {
                    message: e.body_text(),
                }
            })?;
        Ok(Self::from_pairs(pairs))
    }

    /// Add a value, turning the entry into a list if the key already exists
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        match self.0.entry(key.into()) {
            indexmap::map::Entry::Occupied(mut entry) => entry.get_mut().push(value),
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(QueryValue::One(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.0.get(key)
    }

    /// First value for `key`
    pub fn value(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(QueryValue::first)
    }

    /// First value for `key`, or `fallback` when missing or empty
    pub fn value_or<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        match self.value(key) {
            Some(v) if !v.is_empty() => v,
            _ => fallback,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// JSON object form handed to query schemas
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// Sort direction of a table query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Exactly `"desc"` is descending; anything else is ascending
    pub fn from_param(value: &str) -> Self {
        if value == "desc" {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// Engine-wide pagination settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableQuerySettings {
    /// Page size when the request does not give a usable one
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    /// Upper bound applied to requested page sizes (no bound when absent)
    #[serde(default)]
    pub max_page_size: Option<u64>,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

impl Default for TableQuerySettings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
        }
    }
}

/// Normalized table query parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQueryParams {
    /// Page number (starts at 1)
    pub page: u64,

    /// Number of items per page (never zero)
    pub page_size: u64,

    /// Trimmed free-text search, possibly empty
    pub search: String,

    /// Field to sort by; empty means no sorting
    pub sort_by: String,

    /// Sort direction
    pub sort_dir: SortDirection,
}

fn parse_integer(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
}

impl TableQueryParams {
    /// Normalize raw parameters
    ///
    /// Unparseable `page`/`pageSize` fall back to their defaults and
    /// `page <= 0` becomes 1. A page size that is zero or negative is
    /// refused with [`QueryError::InvalidPageSize`].
    pub fn from_params(
        params: &QueryParams,
        settings: &TableQuerySettings,
    ) -> Result<Self, QueryError> {
        let page = match parse_integer(params.value("page")) {
            Some(p) if p > 0 => p.unsigned_abs(),
            _ => DEFAULT_PAGE,
        };

        let requested = match parse_integer(params.value("pageSize")) {
            Some(size) if size <= 0 => return Err(QueryError::InvalidPageSize { value: size }),
            Some(size) => size.unsigned_abs(),
            None => settings.default_page_size,
        };
        let page_size = match settings.max_page_size {
            Some(max) => requested.min(max),
            None => requested,
        };
        if page_size == 0 {
            return Err(QueryError::InvalidPageSize { value: 0 });
        }

        Ok(Self {
            page,
            page_size,
            search: params.value_or("search", "").trim().to_string(),
            sort_by: params.value_or("sortBy", "").to_string(),
            sort_dir: SortDirection::from_param(params.value_or("sortDir", "")),
        })
    }

    /// Index of the first row on the requested page
    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of a table query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    /// Rows on this page (at most `page_size`)
    pub data: Vec<T>,

    /// Rows matching every active filter, across all pages
    pub total_items: u64,

    /// Current page number (starts at 1)
    pub current_page: u64,

    /// Number of items per page
    pub page_size: u64,

    /// Total number of pages
    pub total_pages: u64,
}

impl<T> PageResult<T> {
    /// Assemble a page, computing `total_pages = ceil(total_items / page_size)`
    pub fn new(
        data: Vec<T>,
        total_items: u64,
        current_page: u64,
        page_size: u64,
    ) -> Result<Self, QueryError> {
        if page_size == 0 {
            return Err(QueryError::InvalidPageSize { value: 0 });
        }

        Ok(Self {
            data,
            total_items,
            current_page,
            page_size,
            total_pages: total_items.div_ceil(page_size),
        })
    }

    /// Whether there is a next page
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    /// Whether there is a previous page
    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    /// Convert every row, keeping the counts
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageResult<U> {
        PageResult {
            data: self.data.into_iter().map(f).collect(),
            total_items: self.total_items,
            current_page: self.current_page,
            page_size: self.page_size,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(pairs: &[(&str, &str)]) -> Result<TableQueryParams, QueryError> {
        let params = QueryParams::from_pairs(pairs.iter().copied());
        TableQueryParams::from_params(&params, &TableQuerySettings::default())
    }

    #[test]
    fn test_query_params_defaults() {
        let params = normalize(&[]).unwrap();
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 10);
        assert_eq!(params.search, "");
        assert_eq!(params.sort_by, "");
        assert_eq!(params.sort_dir, SortDirection::Asc);
    }

    #[test]
    fn test_repeated_keys_use_first_value() {
        let params = QueryParams::from_pairs([("page", "3"), ("page", "9"), ("q", "x")]);
        assert_eq!(
            params.get("page"),
            Some(&QueryValue::Many(vec!["3".into(), "9".into()]))
        );
        assert_eq!(params.value("page"), Some("3"));
        assert_eq!(params.value("q"), Some("x"));
        assert_eq!(normalize(&[("page", "3"), ("page", "9")]).unwrap().page, 3);
    }

    #[test]
    fn test_non_positive_or_garbage_page_is_first_page() {
        for raw in ["0", "-4", "abc", "", " "] {
            assert_eq!(normalize(&[("page", raw)]).unwrap().page, 1, "page={raw:?}");
        }
        assert_eq!(normalize(&[("page", " 7 ")]).unwrap().page, 7);
    }

    #[test]
    fn test_garbage_page_size_uses_default() {
        assert_eq!(normalize(&[("pageSize", "many")]).unwrap().page_size, 10);
        assert_eq!(normalize(&[("pageSize", "")]).unwrap().page_size, 10);
    }

    #[test]
    fn test_zero_page_size_is_refused() {
        assert_eq!(
            normalize(&[("pageSize", "0")]),
            Err(QueryError::InvalidPageSize { value: 0 })
        );
        assert_eq!(
            normalize(&[("pageSize", "-3")]),
            Err(QueryError::InvalidPageSize { value: -3 })
        );
    }

    #[test]
    fn test_max_page_size_clamps() {
        let settings = TableQuerySettings {
            default_page_size: 25,
            max_page_size: Some(100),
        };
        let params = QueryParams::from_pairs([("pageSize", "500")]);
        let normalized = TableQueryParams::from_params(&params, &settings).unwrap();
        assert_eq!(normalized.page_size, 100);

        let normalized = TableQueryParams::from_params(&QueryParams::new(), &settings).unwrap();
        assert_eq!(normalized.page_size, 25);
    }

    #[test]
    fn test_huge_default_page_size_is_kept() {
        let settings = TableQuerySettings {
            default_page_size: u64::MAX,
            max_page_size: None,
        };
        let params = QueryParams::from_pairs([("page", "3")]);
        let normalized = TableQueryParams::from_params(&params, &settings).unwrap();
        assert_eq!(normalized.page_size, u64::MAX);
        assert_eq!(normalized.offset(), u64::MAX);

        let zero = TableQuerySettings {
            default_page_size: 0,
            max_page_size: None,
        };
        assert_eq!(
            TableQueryParams::from_params(&QueryParams::new(), &zero),
            Err(QueryError::InvalidPageSize { value: 0 })
        );
    }

    #[test]
    fn test_sort_dir_only_exact_desc() {
        assert_eq!(SortDirection::from_param("desc"), SortDirection::Desc);
        assert_eq!(SortDirection::from_param("DESC"), SortDirection::Asc);
        assert_eq!(SortDirection::from_param("down"), SortDirection::Asc);
    }

    #[test]
    fn test_search_is_trimmed() {
        assert_eq!(normalize(&[("search", "  ada ")]).unwrap().search, "ada");
    }

    #[test]
    fn test_from_uri_decodes_and_accumulates() {
        let uri: Uri = "/users?search=ada%20l&tag=a&tag=b".parse().unwrap();
        let params = QueryParams::from_uri(&uri).unwrap();
        assert_eq!(params.value("search"), Some("ada l"));
        assert_eq!(
            params.to_json(),
            serde_json::json!({ "search": "ada l", "tag": ["a", "b"] })
        );
    }

    #[test]
    fn test_page_result_counts() {
        let page = PageResult::new(vec![1, 2], 5, 2, 2).unwrap();
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(page.has_prev());

        let empty: PageResult<i32> = PageResult::new(vec![], 0, 1, 10).unwrap();
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next());

        assert!(PageResult::<i32>::new(vec![], 3, 1, 0).is_err());
    }

    #[test]
    fn test_page_result_serializes_camel_case() {
        let page = PageResult::new(vec!["a"], 1, 1, 10).unwrap();
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalItems"], 1);
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["pageSize"], 10);
        assert_eq!(json["totalPages"], 1);
    }
}
