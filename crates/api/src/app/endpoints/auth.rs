//! Login endpoint.
//!
//! Credential matching only; sessions, tokens, and authorization are out
//! of scope and deliberately not implemented here.

use serde_json::Value;

use gatehouse_core::{
    ApiError, ApiRegistry, ApiResponse, ApiResult, EndpointDescriptor, HandlerArgs, HandlerRef,
    Method, ParamSpec, codes,
};
use gatehouse_db::Db;
use gatehouse_users::UsersService;

pub fn register(registry: &mut ApiRegistry, db: &Db) -> ApiResult<()> {
    let login_db = db.clone();
    registry.register(
        "login",
        EndpointDescriptor::new(
            Method::Post,
            HandlerRef::from_async(move |args: HandlerArgs| {
                let db = login_db.clone();
                async move {
                    let body = args.body()?.clone();
                    let name = body.get("name").and_then(Value::as_str);
                    let password = body.get("password").and_then(Value::as_str);
                    let (Some(name), Some(password)) = (name, password) else {
                        return Err(ApiError::api(
                            codes::PARAMETER_MISSING,
                            "Missing required fields: name or password",
                        ));
                    };

                    let mut session = db.session().await.map_err(ApiError::from)?;
                    let outcome = UsersService::verify_login(&mut session, name, password)
                        .await
                        .and_then(ApiResponse::success);
                    session.finish(&outcome).await.map_err(ApiError::from)?;
                    outcome
                }
            }),
        )
        .with_param(ParamSpec::body())
        .with_meta("area", "auth"),
    )?;

    Ok(())
}
