//! Users table descriptor and row shaping.

use serde_json::{Map, Value};

use gatehouse_core::ApiResponse;
use gatehouse_db::{Column, ColumnType, SoftDeleteSpec, TableSpec};

/// The `users` table: identity columns plus the shared audit, soft-delete
/// and remark columns. DDL lives in `migrations/0001_users.sql`.
pub const USERS: TableSpec = TableSpec {
    name: "users",
    primary_key: "id",
    columns: &[
        Column::new("id", ColumnType::Uuid),
        Column::new("name", ColumnType::Text),
        Column::new("age", ColumnType::Int),
        Column::new("password", ColumnType::Text),
        Column::new("birthdate", ColumnType::Date),
        Column::new("sex", ColumnType::Int),
        Column::new("status_code", ColumnType::Text),
        // Audit columns; written by database defaults and triggers.
        Column::new("created_at", ColumnType::Timestamp),
        Column::new("updated_at", ColumnType::Timestamp),
        Column::new("created_by_id", ColumnType::Uuid),
        Column::new("updated_by_id", ColumnType::Uuid),
        Column::new("created_by", ColumnType::Text),
        Column::new("updated_by", ColumnType::Text),
        Column::new("is_deleted", ColumnType::Bool),
        Column::new("delete_reason", ColumnType::Text),
        Column::new("remark", ColumnType::Text),
    ],
    soft_delete: Some(SoftDeleteSpec {
        flag: "is_deleted",
        reason: "delete_reason",
    }),
};

/// Columns a client may set through the create/update endpoints.
pub const WRITABLE_COLUMNS: &[&str] = &[
    "name",
    "age",
    "password",
    "birthdate",
    "sex",
    "status_code",
    "remark",
];

/// Keep only client-writable fields from a request body.
pub fn writable_fields(body: &Map<String, Value>) -> Map<String, Value> {
    body.iter()
        .filter(|(key, _)| WRITABLE_COLUMNS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Strip the password column from a row before it leaves the service.
pub fn redact(mut row: Value) -> Value {
    if let Some(object) = row.as_object_mut() {
        object.remove("password");
    }
    row
}

/// Redact every row in a paged envelope in place.
pub fn redact_rows(resp: &mut ApiResponse) {
    if let Some(Value::Array(rows)) = resp.data.as_mut() {
        for row in rows.iter_mut() {
            if let Some(object) = row.as_object_mut() {
                object.remove("password");
            }
        }
    }
}
