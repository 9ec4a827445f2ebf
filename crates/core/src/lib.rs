//! `gatehouse-core` — registry, parameter binding, and response envelope.
//!
//! This crate contains the framework-independent pieces of the gateway:
//! descriptors and their registry, the parameter binder, the handler
//! abstraction, the response envelope, and the request-scoped context.
//! HTTP and database wiring live in the `gatehouse-api` and `gatehouse-db`
//! crates.

pub mod binder;
pub mod context;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod registry;

pub use binder::{BODY_PARAM, ParamSource, ParamSpec, ParamType, RequestParts, bind};
pub use context::ApiContext;
pub use envelope::{ApiResponse, ByteStream, ResponseKind};
pub use error::{ApiError, ApiResult, codes};
pub use handler::{ApiHandler, HandlerArgs, HandlerRef};
pub use registry::{ApiRegistry, EndpointDescriptor, Method};
