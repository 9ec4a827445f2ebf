//! User CRUD endpoints.
//!
//! Each handler opens its own transaction scope and resolves it through
//! `DbSession::finish`, so success commits and failures roll back (unless
//! the error opted out) before the envelope leaves the gateway.

use serde_json::Value;

use gatehouse_core::{
    ApiError, ApiRegistry, ApiResponse, ApiResult, EndpointDescriptor, HandlerArgs, HandlerRef,
    Method, ParamSpec, ParamType, codes,
};
use gatehouse_db::Db;
use gatehouse_users::UsersService;

pub fn register(registry: &mut ApiRegistry, db: &Db) -> ApiResult<()> {
    let pages_db = db.clone();
    registry.register(
        "users.pages",
        EndpointDescriptor::new(
            Method::Get,
            HandlerRef::from_async(move |args: HandlerArgs| {
                let db = pages_db.clone();
                async move {
                    let status = args.opt_str("status").map(str::to_string);
                    let pageindex = args.int("pageindex")?;
                    let pagesize = args.int("pagesize")?;
                    let sortby = args.str("sortby")?.to_string();
                    let descending = args.int("descending")? != 0;

                    let mut session = db.session().await.map_err(ApiError::from)?;
                    let outcome = UsersService::list(
                        &mut session,
                        status.as_deref(),
                        pageindex,
                        pagesize,
                        &sortby,
                        descending,
                    )
                    .await;
                    session.finish(&outcome).await.map_err(ApiError::from)?;
                    outcome
                }
            }),
        )
        .with_param(ParamSpec::query("status", ParamType::Str).with_default(Value::Null))
        .with_param(ParamSpec::query("pageindex", ParamType::Int).with_default(0))
        .with_param(ParamSpec::query("pagesize", ParamType::Int).with_default(10))
        .with_param(ParamSpec::query("sortby", ParamType::Str).with_default("id"))
        .with_param(ParamSpec::query("descending", ParamType::Int).with_default(0))
        .with_meta("area", "users"),
    )?;

    let get_db = db.clone();
    registry.register(
        "users",
        EndpointDescriptor::new(
            Method::Get,
            HandlerRef::from_async(move |args: HandlerArgs| {
                let db = get_db.clone();
                async move {
                    let user_id = args.str("user_id")?.to_string();

                    let mut session = db.session().await.map_err(ApiError::from)?;
                    let outcome = UsersService::get(&mut session, &user_id).await.and_then(|row| {
                        match row {
                            Some(row) => ApiResponse::success(row),
                            None => Ok(ApiResponse::error(codes::RECORD_NOT_EXISTS, "User not found")),
                        }
                    });
                    session.finish(&outcome).await.map_err(ApiError::from)?;
                    outcome
                }
            }),
        )
        .with_param(ParamSpec::query("user_id", ParamType::Str))
        .with_meta("area", "users"),
    )?;

    let create_db = db.clone();
    registry.register(
        "users_create",
        EndpointDescriptor::new(
            Method::Post,
            HandlerRef::from_async(move |args: HandlerArgs| {
                let db = create_db.clone();
                async move {
                    let body = args.body()?.clone();

                    let mut session = db.session().await.map_err(ApiError::from)?;
                    let outcome = UsersService::create(&mut session, &body)
                        .await
                        .and_then(ApiResponse::success);
                    session.finish(&outcome).await.map_err(ApiError::from)?;
                    outcome
                }
            }),
        )
        .with_param(ParamSpec::body())
        .with_meta("area", "users"),
    )?;

    let update_db = db.clone();
    registry.register(
        "users_update",
        EndpointDescriptor::new(
            Method::Put,
            HandlerRef::from_async(move |args: HandlerArgs| {
                let db = update_db.clone();
                async move {
                    let body = args.body()?.clone();

                    let mut session = db.session().await.map_err(ApiError::from)?;
                    let outcome = UsersService::update(&mut session, &body)
                        .await
                        .and_then(ApiResponse::success);
                    session.finish(&outcome).await.map_err(ApiError::from)?;
                    outcome
                }
            }),
        )
        .with_param(ParamSpec::body())
        .with_meta("area", "users"),
    )?;

    let delete_db = db.clone();
    registry.register(
        "users_delete",
        EndpointDescriptor::new(
            Method::Delete,
            HandlerRef::from_async(move |args: HandlerArgs| {
                let db = delete_db.clone();
                async move {
                    let body = args.body()?.clone();
                    let Some(id) = body.get("id").and_then(Value::as_str) else {
                        return Err(ApiError::api(codes::PARAMETER_MISSING, "Missing user id"));
                    };
                    let reason = body.get("delete_reason").and_then(Value::as_str);

                    let mut session = db.session().await.map_err(ApiError::from)?;
                    let outcome = UsersService::delete(&mut session, id, reason)
                        .await
                        .and_then(ApiResponse::success);
                    session.finish(&outcome).await.map_err(ApiError::from)?;
                    outcome
                }
            }),
        )
        .with_param(ParamSpec::body())
        .with_meta("area", "users"),
    )?;

    Ok(())
}
