//! HTTP application wiring.
//!
//! - `gateway.rs`: the generic dispatch path (lookup → bind → invoke →
//!   envelope-to-HTTP), plus health and 404 handling
//! - `endpoints/`: explicit endpoint registration, one file per domain area
//!
//! Registration happens once in [`build_registry`], before the server
//! starts accepting connections; nothing registers as a side effect of
//! merely linking a module.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use axum::{Router, routing::get};
use tower::ServiceBuilder;

use gatehouse_core::{ApiRegistry, ApiResult};
use gatehouse_db::Db;

pub mod endpoints;
pub mod gateway;

pub use gateway::AppState;

/// Populate the endpoint registry. Called once at startup; a registration
/// failure is fatal and the process must not serve traffic.
pub fn build_registry(db: &Db) -> ApiResult<ApiRegistry> {
    let mut registry = ApiRegistry::new();
    endpoints::system::register(&mut registry)?;
    endpoints::hello::register(&mut registry)?;
    endpoints::users::register(&mut registry, db)?;
    endpoints::auth::register(&mut registry, db)?;
    Ok(registry)
}

/// Build the HTTP router around a populated registry.
///
/// `stopped` is the health flag: once set, `GET /__check` reports "STOP".
pub fn build_app(registry: Arc<ApiRegistry>, stopped: Arc<AtomicBool>) -> Router {
    let state = AppState { registry, stopped };

    Router::new()
        .route("/__check", get(gateway::health))
        .route(
            "/api/*name",
            get(gateway::dispatch)
                .post(gateway::dispatch)
                .put(gateway::dispatch)
                .delete(gateway::dispatch),
        )
        .fallback(gateway::not_found)
        .with_state(state)
        .layer(ServiceBuilder::new())
}
