//! Handler abstraction and bound call arguments.
//!
//! Any function can serve an endpoint: the registry stores a [`HandlerRef`]
//! and the gateway calls it with [`HandlerArgs`] produced by the binder.
//! Synchronous and asynchronous functions are both accepted and dispatch
//! identically.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::envelope::ApiResponse;
use crate::error::{ApiError, ApiResult};

/// Bound call arguments, keyed by parameter name.
///
/// Values are exactly what the binder produced: coerced query values,
/// defaults, or the parsed body object.
#[derive(Debug, Clone, Default)]
pub struct HandlerArgs {
    values: Map<String, Value>,
}

impl HandlerArgs {
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Required string argument.
    pub fn str(&self, name: &str) -> ApiResult<&str> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::internal(format!("argument '{name}' missing or not a string")))
    }

    /// Optional string argument; absent or JSON null both read as `None`.
    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Required integer argument.
    pub fn int(&self, name: &str) -> ApiResult<i64> {
        self.get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| ApiError::internal(format!("argument '{name}' missing or not an integer")))
    }

    pub fn opt_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn opt_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn opt_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// The parsed request body object (the reserved `body` parameter).
    pub fn body(&self) -> ApiResult<&Map<String, Value>> {
        self.get(crate::binder::BODY_PARAM)
            .and_then(Value::as_object)
            .ok_or_else(|| ApiError::internal("body argument missing; declare a body parameter"))
    }

    /// The full argument set as a JSON object (for the request context).
    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// Future returned by a handler invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ApiResult<ApiResponse>> + Send + 'static>>;

/// An invocable endpoint function.
pub trait ApiHandler: Send + Sync {
    fn call(&self, args: HandlerArgs) -> HandlerFuture;
}

/// Shared, cloneable reference to a registered handler.
#[derive(Clone)]
pub struct HandlerRef(Arc<dyn ApiHandler>);

impl HandlerRef {
    /// Wrap an async function.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(HandlerArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<ApiResponse>> + Send + 'static,
    {
        Self(Arc::new(AsyncFnHandler(f)))
    }

    /// Wrap a plain synchronous function.
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn(HandlerArgs) -> ApiResult<ApiResponse> + Send + Sync + 'static,
    {
        Self(Arc::new(SyncFnHandler(f)))
    }

    pub fn call(&self, args: HandlerArgs) -> HandlerFuture {
        self.0.call(args)
    }
}

impl fmt::Debug for HandlerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerRef")
    }
}

struct AsyncFnHandler<F>(F);

impl<F, Fut> ApiHandler for AsyncFnHandler<F>
where
    F: Fn(HandlerArgs) -> Fut + Send + Sync,
    Fut: Future<Output = ApiResult<ApiResponse>> + Send + 'static,
{
    fn call(&self, args: HandlerArgs) -> HandlerFuture {
        Box::pin((self.0)(args))
    }
}

struct SyncFnHandler<F>(F);

impl<F> ApiHandler for SyncFnHandler<F>
where
    F: Fn(HandlerArgs) -> ApiResult<ApiResponse> + Send + Sync,
{
    fn call(&self, args: HandlerArgs) -> HandlerFuture {
        let out = (self.0)(args);
        Box::pin(std::future::ready(out))
    }
}
