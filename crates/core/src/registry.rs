//! Endpoint descriptors and their registry.
//!
//! The registry is populated once during bootstrap, before the server
//! accepts traffic, and read for the rest of the process lifetime. There is
//! no removal; re-registering a name overwrites the earlier descriptor and
//! logs the overwrite.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::binder::ParamSpec;
use crate::error::{ApiError, ApiResult};
use crate::handler::HandlerRef;

/// HTTP method an endpoint is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Write methods may carry a request body; GET may not.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            other => Err(ApiError::invalid_usage(format!("unsupported method: {other}"))),
        }
    }
}

/// Stored registration record for one endpoint.
#[derive(Debug)]
pub struct EndpointDescriptor {
    method: Method,
    handler: Option<HandlerRef>,
    params: Vec<ParamSpec>,
    meta: BTreeMap<String, Value>,
}

impl EndpointDescriptor {
    pub fn new(method: Method, handler: HandlerRef) -> Self {
        Self {
            method,
            handler: Some(handler),
            params: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Descriptor with no handler reference. [`ApiRegistry::register`]
    /// rejects these; they only enter a registry through
    /// [`ApiRegistry::register_unchecked`].
    pub fn without_handler(method: Method) -> Self {
        Self {
            method,
            handler: None,
            params: Vec::new(),
            meta: BTreeMap::new(),
        }
    }

    /// Append a parameter spec. Declaration order is binding order.
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Attach open metadata (documentation tags, rate-limit hints, ...).
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn handler(&self) -> Option<&HandlerRef> {
        self.handler.as_ref()
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn meta(&self) -> &BTreeMap<String, Value> {
        &self.meta
    }
}

/// Name → descriptor mapping for the whole process.
#[derive(Debug, Default)]
pub struct ApiRegistry {
    entries: HashMap<String, EndpointDescriptor>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a descriptor under `name`.
    ///
    /// Fails when the descriptor lacks a handler reference. Registering an
    /// existing name overwrites the previous descriptor (logged at warn).
    pub fn register(&mut self, name: impl Into<String>, descriptor: EndpointDescriptor) -> ApiResult<()> {
        let name = name.into();
        if descriptor.handler.is_none() {
            return Err(ApiError::internal(format!(
                "descriptor for '{name}' must carry a handler"
            )));
        }
        if self.entries.contains_key(&name) {
            tracing::warn!(endpoint = %name, "re-registering endpoint; previous descriptor replaced");
        }
        self.entries.insert(name, descriptor);
        Ok(())
    }

    /// Insert without validating the handler reference.
    ///
    /// The gateway tolerates handlerless entries by answering 500; normal
    /// code registers through [`ApiRegistry::register`].
    pub fn register_unchecked(&mut self, name: impl Into<String>, descriptor: EndpointDescriptor) {
        self.entries.insert(name.into(), descriptor);
    }

    pub fn lookup(&self, name: &str) -> Option<&EndpointDescriptor> {
        self.entries.get(name)
    }

    /// Registered endpoint names, sorted for stable logging.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
