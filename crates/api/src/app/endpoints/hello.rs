//! Minimal endpoints exercising the registry without any backing store.

use serde_json::{Value, json};

use gatehouse_core::{
    ApiRegistry, ApiResponse, ApiResult, EndpointDescriptor, HandlerArgs, HandlerRef, Method,
    ParamSpec,
};

pub fn register(registry: &mut ApiRegistry) -> ApiResult<()> {
    registry.register(
        "hello",
        EndpointDescriptor::new(
            Method::Get,
            HandlerRef::from_sync(|_args| {
                ApiResponse::success(json!({"message": "Hello from gatehouse!"}))
            }),
        )
        .with_meta("area", "hello"),
    )?;

    registry.register(
        "hello_post",
        EndpointDescriptor::new(
            Method::Post,
            HandlerRef::from_async(|args: HandlerArgs| async move {
                let name = args
                    .body()?
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("Guest")
                    .to_string();
                ApiResponse::success(json!({"message": format!("Hello, {name}!")}))
            }),
        )
        .with_param(ParamSpec::body())
        .with_meta("area", "hello"),
    )?;

    Ok(())
}
