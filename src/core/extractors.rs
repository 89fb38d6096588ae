//! Axum extractors for query parameters and raw requests
//!
//! This module turns an axum request into the transport-agnostic
//! [`RawRequest`] consumed by the validation wrapper:
//! - path parameters become a JSON object of strings
//! - the query string keeps repeated keys
//! - the body is read as JSON for methods that carry one, when asked to

use axum::body::Body;
use axum::extract::{FromRequestParts, Path, Request};
use axum::http::Method;
use axum::http::request::Parts;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::core::error::{CrudError, RequestError, ValidationError};
use crate::core::handler::RawRequest;
use crate::core::query::QueryParams;

/// Largest request body read by the wrapper
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = CrudError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(QueryParams::from_uri(&parts.uri)?)
    }
}

/// Whether the wrapper reads and validates a body for this method
pub fn method_has_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Path parameters as a JSON object; empty when the route has none
pub async fn path_params(parts: &mut Parts) -> Map<String, Value> {
    match Path::<HashMap<String, String>>::from_request_parts(parts, &()).await {
        Ok(Path(params)) => params
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
        Err(_) => Map::new(),
    }
}

/// Parse a request body as JSON; an empty body is `null`
pub fn parse_json_body(bytes: &[u8]) -> Result<Value, CrudError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        CrudError::Validation(ValidationError::InvalidJson {
            message: e.to_string(),
        })
    })
}

async fn read_body(body: Body) -> Result<Value, CrudError> {
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| body_read_error(&e))?;
    parse_json_body(&bytes)
}

fn body_read_error(err: &axum::Error) -> CrudError {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<http_body_util::LengthLimitError>() {
            return RequestError::PayloadTooLarge { limit: BODY_LIMIT }.into();
        }
        source = e.source();
    }
    RequestError::InvalidParameter {
        name: "body".to_string(),
        message: err.to_string(),
    }
    .into()
}

impl RawRequest {
    /// Collect method, path, params, query and body from an axum request
    ///
    /// The body is only read when `with_body` is set and the method is
    /// POST, PUT or PATCH; otherwise it is `null`.
    pub async fn from_request(req: Request, with_body: bool) -> Result<Self, CrudError> {
        let (mut parts, body) = req.into_parts();
        let params = path_params(&mut parts).await;
        let query = QueryParams::from_uri(&parts.uri)?;

        let body = if with_body && method_has_body(&parts.method) {
            read_body(body).await?
        } else {
            Value::Null
        };

        Ok(RawRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            params,
            query,
            body,
        })
    }
}
