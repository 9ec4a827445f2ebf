//! Parameter binding: request → handler arguments.
//!
//! Each endpoint registers an explicit parameter specification. At dispatch
//! time the binder walks the specs in declaration order and, per parameter,
//! applies the first matching rule:
//!
//! 1. the reserved `body` parameter takes the request body, which must be a
//!    JSON object and is only allowed on write methods;
//! 2. a matching query-string key is taken, coerced when the spec declares
//!    int/float/bool;
//! 3. a declared default is used;
//! 4. otherwise binding fails with "Missing required parameter".
//!
//! Binding failures never invoke the handler.

use bytes::Bytes;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::handler::HandlerArgs;
use crate::registry::Method;

/// Reserved parameter name bound to the parsed request body.
pub const BODY_PARAM: &str = "body";

/// Where a parameter's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Query,
    Body,
}

/// Declared primitive type of a query parameter.
///
/// Only int/float/bool trigger coercion; everything else binds the raw
/// string. Richer validation belongs to the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    Str,
    Int,
    Float,
    Bool,
}

/// One declared handler parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    name: String,
    source: ParamSource,
    ty: ParamType,
    default: Option<Value>,
}

impl ParamSpec {
    /// Query-string parameter.
    pub fn query(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            source: ParamSource::Query,
            ty,
            default: None,
        }
    }

    /// The reserved request-body parameter.
    pub fn body() -> Self {
        Self {
            name: BODY_PARAM.to_string(),
            source: ParamSource::Body,
            ty: ParamType::Str,
            default: None,
        }
    }

    /// Default value bound when the request does not supply the parameter.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> ParamSource {
        self.source
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }
}

/// The slice of an incoming request the binder consumes.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    /// Decoded query pairs in request order; repeated keys keep the first.
    pub query: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl RequestParts {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            query: Vec::new(),
            body: None,
        }
    }

    fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Compute the call arguments for a handler, or fail with an invalid-usage
/// error.
pub fn bind(params: &[ParamSpec], request: &RequestParts) -> ApiResult<HandlerArgs> {
    let mut values = serde_json::Map::new();

    for param in params {
        if param.source == ParamSource::Body || param.name == BODY_PARAM {
            values.insert(param.name.clone(), parse_body(request)?);
            continue;
        }

        if let Some(raw) = request.query_value(&param.name) {
            values.insert(param.name.clone(), coerce(&param.name, param.ty, raw)?);
            continue;
        }

        if let Some(default) = &param.default {
            values.insert(param.name.clone(), default.clone());
            continue;
        }

        return Err(ApiError::invalid_usage(format!(
            "Missing required parameter: {}",
            param.name
        )));
    }

    Ok(HandlerArgs::new(values))
}

/// Unified JSON body parsing.
///
/// The method gate comes first: a read method with a declared body parameter
/// is rejected whether or not a body was sent.
fn parse_body(request: &RequestParts) -> ApiResult<Value> {
    if !request.method.allows_body() {
        return Err(ApiError::invalid_usage("Request body not allowed for this method"));
    }

    let raw = match request.body.as_deref() {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return Err(ApiError::invalid_usage("Request body is required")),
    };

    let parsed: Value =
        serde_json::from_slice(raw).map_err(|_| ApiError::invalid_usage("Invalid JSON body"))?;

    if !parsed.is_object() {
        return Err(ApiError::invalid_usage("JSON body must be an object"));
    }

    Ok(parsed)
}

fn coerce(name: &str, ty: ParamType, raw: &str) -> ApiResult<Value> {
    let invalid = || ApiError::invalid_usage(format!("Invalid value for parameter '{name}'"));

    match ty {
        ParamType::Str => Ok(Value::from(raw)),
        ParamType::Int => raw.parse::<i64>().map(Value::from).map_err(|_| invalid()),
        ParamType::Float => {
            let parsed = raw.parse::<f64>().map_err(|_| invalid())?;
            serde_json::Number::from_f64(parsed)
                .map(Value::Number)
                .ok_or_else(invalid)
        }
        ParamType::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::from(true)),
            "false" | "0" => Ok(Value::from(false)),
            _ => Err(invalid()),
        },
    }
}
