//! User CRUD service over the generic data layer.

use chrono::NaiveDate;
use serde_json::{Map, Value, json};

use gatehouse_core::{ApiError, ApiResponse, ApiResult, codes};
use gatehouse_db::{Criterion, DbSession, PageRequest, crud};

use crate::model::{self, USERS};

/// Business operations on the users table. Stateless; every call runs in
/// the caller's transaction scope.
pub struct UsersService;

impl UsersService {
    /// Paged user listing with an optional status filter. Passwords are
    /// redacted from the returned page.
    pub async fn list(
        session: &mut DbSession,
        status: Option<&str>,
        pageindex: i64,
        pagesize: i64,
        sortby: &str,
        descending: bool,
    ) -> ApiResult<ApiResponse> {
        let mut criteria = Vec::new();
        if let Some(status) = status {
            criteria.push(Criterion::eq("status_code", status));
        }

        let page = PageRequest {
            pageindex,
            pagesize,
            criteria,
            sortby: Some(sortby.to_string()),
            descending,
            deleted: false,
        };

        let mut resp = crud::fetch_pages(session, &USERS, &page).await?;
        model::redact_rows(&mut resp);
        Ok(resp)
    }

    /// Fetch one live user by id, redacted.
    pub async fn get(session: &mut DbSession, user_id: &str) -> ApiResult<Option<Value>> {
        let row = crud::find(session, &USERS, &Value::from(user_id), false).await?;
        Ok(row.map(model::redact))
    }

    /// Create a user. `name` and `password` are required; duplicate names
    /// are a business error.
    pub async fn create(session: &mut DbSession, body: &Map<String, Value>) -> ApiResult<Value> {
        let name = body.get("name").and_then(Value::as_str);
        let password = body.get("password").and_then(Value::as_str);
        let (Some(name), Some(_)) = (name, password) else {
            return Err(ApiError::api(
                codes::PARAMETER_MISSING,
                "Missing required fields: name or password",
            ));
        };
        validate_birthdate(body)?;

        let existing = crud::fetch(session, &USERS, &["id"], &[Criterion::eq("name", name)]).await?;
        if !existing.is_empty() {
            return Err(ApiError::api(codes::USER_NAME_EXISTS, "User already exists"));
        }

        let fields = model::writable_fields(body);
        let row = crud::add(session, &USERS, fields, None)
            .await?
            .ok_or_else(|| ApiError::internal("insert returned no row"))?;

        tracing::info!(user = %name, "user created");
        Ok(model::redact(row))
    }

    /// Update a user addressed by the `id` field in the body. The row must
    /// exist and be live.
    pub async fn update(session: &mut DbSession, body: &Map<String, Value>) -> ApiResult<Value> {
        let Some(id) = body.get("id").and_then(Value::as_str) else {
            return Err(ApiError::api(codes::PARAMETER_MISSING, "Missing user id"));
        };
        validate_birthdate(body)?;

        let current = crud::find(session, &USERS, &Value::from(id), false).await?;
        if current.is_none() {
            return Err(ApiError::api(codes::RECORD_NOT_EXISTS, "User not found"));
        }

        let mut fields = model::writable_fields(body);
        if fields.is_empty() {
            return Err(ApiError::api(codes::PARAMETER_MISSING, "Nothing to update"));
        }
        fields.insert("id".to_string(), Value::from(id));
        crud::update(session, &USERS, fields).await?;

        let row = crud::find(session, &USERS, &Value::from(id), false)
            .await?
            .ok_or_else(|| ApiError::internal("updated row vanished"))?;
        Ok(model::redact(row))
    }

    /// Soft-delete a user. Returns whether a live row was deleted.
    pub async fn delete(
        session: &mut DbSession,
        user_id: &str,
        reason: Option<&str>,
    ) -> ApiResult<bool> {
        let current = crud::find(session, &USERS, &Value::from(user_id), false).await?;
        if current.is_none() {
            return Ok(false);
        }

        crud::delete(session, &USERS, &[Value::from(user_id)], reason, false).await?;
        Ok(true)
    }

    /// Credential check for the login endpoint. Plain equality against the
    /// stored password; real credential handling is out of scope here.
    pub async fn verify_login(
        session: &mut DbSession,
        name: &str,
        password: &str,
    ) -> ApiResult<Value> {
        let rows = crud::fetch(
            session,
            &USERS,
            &["id", "name", "status_code"],
            &[Criterion::eq("name", name), Criterion::eq("password", password)],
        )
        .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(json!({
                "id": row.get("id").cloned().unwrap_or(Value::Null),
                "name": row.get("name").cloned().unwrap_or(Value::Null),
                "status_code": row.get("status_code").cloned().unwrap_or(Value::Null),
            })),
            None => Err(ApiError::api(
                codes::PASSWORD_INVALID,
                "Invalid username or password",
            )),
        }
    }
}

/// `birthdate`, when present, must be a `YYYY-MM-DD` string (or null).
fn validate_birthdate(body: &Map<String, Value>) -> ApiResult<()> {
    match body.get("birthdate") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(raw)) if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() => Ok(()),
        Some(_) => Err(ApiError::api(
            codes::API_ERROR,
            "Invalid birthdate format, must be YYYY-MM-DD",
        )),
    }
}
