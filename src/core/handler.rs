//! Request/response validation wrapper
//!
//! [`BaseEventHandler::builder`] wraps a business handler so that every
//! request goes through the same lifecycle:
//!
//! 1. body (POST, PUT and PATCH only), path params and query are parsed by
//!    their schemas, in that order; the first failure answers 400 and the
//!    handler never runs
//! 2. `on_request` hooks run
//! 3. the handler runs with a [`ValidatedContext`]
//! 4. the serialized result is checked against the response schema; a
//!    mismatch is logged and answered with a generic 500
//! 5. `on_before_response` hooks see (and may replace) the payload
//!
//! A slot without a schema has type `()` in the context, so a handler can
//! only read typed input that was actually validated.
//!
//! # Example
//!
//! ```rust,ignore
//! let create_user = BaseEventHandler::builder()
//!     .validate_body(insert_schema)
//!     .validate_response(user_resource)
//!     .success_status(StatusCode::CREATED)
//!     .handler(move |mut ctx| {
//!         let store = store.clone();
//!         async move {
//!             let body = ctx.take_body()?;
//!             Ok(store.insert(body).await?)
//!         }
//!     });
//!
//! let app = Router::new().route("/api/v1/users", post(create_user));
//! ```

use axum::Json;
use axum::extract::Request;
use axum::handler::Handler;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::core::error::{
    CrudError, INVALID_RESPONSE_MESSAGE, UNEXPECTED_ERROR_MESSAGE, ValidationError,
};
use crate::core::extractors::method_has_body;
use crate::core::query::QueryParams;
use crate::core::schema::{Schema, Violations};

/// A request reduced to what the wrapper validates
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub method: Method,
    pub path: String,
    /// Path parameters, all string-valued
    pub params: Map<String, Value>,
    pub query: QueryParams,
    /// Parsed JSON body, `null` when empty or not read
    pub body: Value,
}

impl RawRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Map::new(),
            query: QueryParams::new(),
            body: Value::Null,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), Value::String(value.into()));
        self
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }
}

/// A successful reply
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    /// `None` for 204 No Content
    pub body: Option<Value>,
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        }
    }
}

/// Request data after input validation
#[derive(Debug, Clone)]
pub struct ValidatedContext<B = (), P = (), Q = ()> {
    pub method: Method,
    pub path: String,
    pub raw_params: Map<String, Value>,
    pub raw_query: QueryParams,
    /// Set only when a body schema was supplied and the method carries a body
    pub body: Option<B>,
    pub params: P,
    pub query: Q,
}

impl<B, P, Q> ValidatedContext<B, P, Q> {
    /// Take the validated body, answering 400 when the request had none
    pub fn take_body(&mut self) -> Result<B, CrudError> {
        self.body.take().ok_or_else(|| {
            CrudError::Validation(ValidationError::Violations(Violations::single(
                "",
                "Request body is required",
            )))
        })
    }
}

/// One input slot of the wrapper: either a schema or nothing
pub trait InputSlot: Send + Sync + 'static {
    type Output: Send + 'static;

    /// Whether a schema was supplied for this slot
    const ACTIVE: bool;

    fn parse_slot(&self, input: Value) -> Result<Self::Output, Violations>;
}

/// Slot without a schema
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSchema;

impl InputSlot for NoSchema {
    type Output = ();

    const ACTIVE: bool = false;

    fn parse_slot(&self, _input: Value) -> Result<(), Violations> {
        Ok(())
    }
}

/// Slot validated by a schema
#[derive(Debug, Clone)]
pub struct Validate<S>(pub S);

impl<S: Schema> InputSlot for Validate<S> {
    type Output = S::Output;

    const ACTIVE: bool = true;

    fn parse_slot(&self, input: Value) -> Result<S::Output, Violations> {
        self.0.parse(input)
    }
}

type RequestHook = Arc<dyn Fn(&RawRequest) -> BoxFuture<'static, Result<(), CrudError>> + Send + Sync>;
type ResponseHook = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, CrudError>> + Send + Sync>;
type ResponseCheck = Arc<dyn Fn(Value) -> Result<(), Violations> + Send + Sync>;

/// Entry point for building validated handlers
pub struct BaseEventHandler;

impl BaseEventHandler {
    pub fn builder() -> HandlerBuilder {
        HandlerBuilder {
            body: NoSchema,
            params: NoSchema,
            query: NoSchema,
            response: None,
            on_request: Vec::new(),
            on_before_response: Vec::new(),
            success_status: StatusCode::OK,
        }
    }
}

/// Builder for [`EventHandler`]; the business handler is set last
pub struct HandlerBuilder<B = NoSchema, P = NoSchema, Q = NoSchema> {
    body: B,
    params: P,
    query: Q,
    response: Option<ResponseCheck>,
    on_request: Vec<RequestHook>,
    on_before_response: Vec<ResponseHook>,
    success_status: StatusCode,
}

impl<B, P, Q> HandlerBuilder<B, P, Q> {
    /// Validate the JSON body of POST, PUT and PATCH requests
    pub fn validate_body<S: Schema>(self, schema: S) -> HandlerBuilder<Validate<S>, P, Q> {
        HandlerBuilder {
            body: Validate(schema),
            params: self.params,
            query: self.query,
            response: self.response,
            on_request: self.on_request,
            on_before_response: self.on_before_response,
            success_status: self.success_status,
        }
    }

    /// Validate path parameters, given as an object of strings
    pub fn validate_params<S: Schema>(self, schema: S) -> HandlerBuilder<B, Validate<S>, Q> {
        HandlerBuilder {
            body: self.body,
            params: Validate(schema),
            query: self.query,
            response: self.response,
            on_request: self.on_request,
            on_before_response: self.on_before_response,
            success_status: self.success_status,
        }
    }

    /// Validate the query, given as an object of strings or string arrays
    pub fn validate_query<S: Schema>(self, schema: S) -> HandlerBuilder<B, P, Validate<S>> {
        HandlerBuilder {
            body: self.body,
            params: self.params,
            query: Validate(schema),
            response: self.response,
            on_request: self.on_request,
            on_before_response: self.on_before_response,
            success_status: self.success_status,
        }
    }

    /// Check the serialized handler result before it is sent
    pub fn validate_response<S: Schema>(mut self, schema: S) -> Self {
        self.response = Some(Arc::new(move |value| schema.parse(value).map(|_| ())));
        self
    }

    /// Run after input validation, before the handler; an error aborts
    pub fn on_request<H, Fut>(mut self, hook: H) -> Self
    where
        H: Fn(&RawRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CrudError>> + Send + 'static,
    {
        self.on_request
            .push(Arc::new(move |request: &RawRequest| hook(request).boxed()));
        self
    }

    /// Run on the validated payload; the returned value is sent
    pub fn on_before_response<H, Fut>(mut self, hook: H) -> Self
    where
        H: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CrudError>> + Send + 'static,
    {
        self.on_before_response
            .push(Arc::new(move |payload: Value| hook(payload).boxed()));
        self
    }

    /// Status of successful replies (default 200)
    pub fn success_status(mut self, status: StatusCode) -> Self {
        self.success_status = status;
        self
    }

    /// Set the business handler
    pub fn handler<H, Fut, T>(self, handler: H) -> EventHandler<B, P, Q, H>
    where
        B: InputSlot,
        P: InputSlot,
        Q: InputSlot,
        H: Fn(ValidatedContext<B::Output, P::Output, Q::Output>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, CrudError>> + Send,
        T: Serialize,
    {
        EventHandler {
            config: Arc::new(self),
            handler,
        }
    }
}

/// A validated handler, usable as an axum handler
pub struct EventHandler<B, P, Q, H> {
    config: Arc<HandlerBuilder<B, P, Q>>,
    handler: H,
}

impl<B, P, Q, H: Clone> Clone for EventHandler<B, P, Q, H> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            handler: self.handler.clone(),
        }
    }
}

fn reject(request: &RawRequest, section: &'static str, violations: Violations) -> CrudError {
    tracing::warn!(
        method = %request.method,
        path = %request.path,
        section,
        issues = violations.len(),
        "request rejected by validation"
    );
    CrudError::Validation(ValidationError::Violations(violations))
}

impl<B, P, Q, H, Fut, T> EventHandler<B, P, Q, H>
where
    B: InputSlot,
    P: InputSlot,
    Q: InputSlot,
    H: Fn(ValidatedContext<B::Output, P::Output, Q::Output>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, CrudError>> + Send,
    T: Serialize,
{
    /// Run the full lifecycle for one request
    pub async fn handle(&self, request: RawRequest) -> Result<Reply, CrudError> {
        let config = &self.config;

        let body = if B::ACTIVE && method_has_body(&request.method) {
            let parsed = config
                .body
                .parse_slot(request.body.clone())
                .map_err(|v| reject(&request, "body", v))?;
            Some(parsed)
        } else {
            None
        };
        let params = config
            .params
            .parse_slot(Value::Object(request.params.clone()))
            .map_err(|v| reject(&request, "params", v))?;
        let query = config
            .query
            .parse_slot(request.query.to_json())
            .map_err(|v| reject(&request, "query", v))?;

        for hook in &config.on_request {
            hook(&request).await?;
        }

        tracing::debug!(method = %request.method, path = %request.path, "input validated");

        let ctx = ValidatedContext {
            method: request.method.clone(),
            path: request.path.clone(),
            raw_params: request.params.clone(),
            raw_query: request.query.clone(),
            body,
            params,
            query,
        };

        let result = match (self.handler)(ctx).await {
            Ok(result) => result,
            Err(CrudError::Unexpected(err)) => {
                tracing::error!(path = %request.path, error = ?err, "unexpected handler failure");
                return Err(CrudError::Internal(UNEXPECTED_ERROR_MESSAGE.to_string()));
            }
            Err(err) => return Err(err),
        };

        let mut payload = serde_json::to_value(&result).map_err(|err| {
            tracing::error!(path = %request.path, error = %err, "handler result is not serializable");
            CrudError::Internal(UNEXPECTED_ERROR_MESSAGE.to_string())
        })?;

        if let Some(check) = &config.response {
            if let Err(violations) = check(payload.clone()) {
                tracing::error!(
                    path = %request.path,
                    violations = %violations,
                    "response validation failed"
                );
                return Err(CrudError::Internal(INVALID_RESPONSE_MESSAGE.to_string()));
            }
        }

        for hook in &config.on_before_response {
            payload = hook(payload).await?;
        }

        let body = (config.success_status != StatusCode::NO_CONTENT).then_some(payload);
        Ok(Reply {
            status: config.success_status,
            body,
        })
    }
}

impl<B, P, Q, H, Fut, T, S> Handler<(), S> for EventHandler<B, P, Q, H>
where
    B: InputSlot,
    P: InputSlot,
    Q: InputSlot,
    H: Fn(ValidatedContext<B::Output, P::Output, Q::Output>) -> Fut
        + Clone
        + Send
        + Sync
        + 'static,
    Fut: Future<Output = Result<T, CrudError>> + Send + 'static,
    T: Serialize + Send + 'static,
    S: Send + Sync + 'static,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, req: Request, _state: S) -> Self::Future {
        Box::pin(async move {
            let request = match RawRequest::from_request(req, B::ACTIVE).await {
                Ok(request) => request,
                Err(err) => return err.into_response(),
            };
            match self.handle(request).await {
                Ok(reply) => reply.into_response(),
                Err(err) => err.into_response(),
            }
        })
    }
}
