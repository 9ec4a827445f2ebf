//! Introspection endpoints.

use serde_json::json;

use gatehouse_core::{
    ApiContext, ApiRegistry, ApiResponse, ApiResult, EndpointDescriptor, HandlerRef, Method,
};

pub fn register(registry: &mut ApiRegistry) -> ApiResult<()> {
    registry.register(
        "whoami",
        EndpointDescriptor::new(
            Method::Get,
            HandlerRef::from_sync(|_args| {
                // Reads back the request context the gateway bound for this
                // call; absent only if invoked outside a request scope.
                let ctx = ApiContext::current().unwrap_or_default();
                ApiResponse::success(json!({
                    "auth": ctx.auth,
                    "user_id": ctx.user_id,
                    "username": ctx.username,
                    "api_name": ctx.api_name,
                    "api_method": ctx.api_method,
                    "remote_addr": ctx.remote_addr,
                    "path": ctx.path,
                }))
            }),
        )
        .with_meta("area", "system"),
    )?;

    Ok(())
}
