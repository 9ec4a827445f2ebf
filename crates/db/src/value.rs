//! Bridging JSON field maps and Postgres values.
//!
//! Writes go JSON → [`SqlValue`] (driven by the declared column type) →
//! bind parameter. Reads come back through [`row_to_json`], which decodes
//! each column by its reported Postgres type into a `serde_json::Value`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{Column as _, Postgres, QueryBuilder, Row, TypeInfo};
use uuid::Uuid;

use crate::error::DbError;
use crate::table::ColumnType;

/// A typed bind parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(Value),
}

impl SqlValue {
    /// Convert a JSON value for a column of declared type `ty`.
    /// Returns `None` when the value does not fit the column.
    pub fn from_json(value: &Value, ty: ColumnType) -> Option<SqlValue> {
        if value.is_null() {
            return Some(SqlValue::Null);
        }
        match ty {
            ColumnType::Uuid => value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(SqlValue::Uuid),
            ColumnType::Text => value.as_str().map(|s| SqlValue::Text(s.to_string())),
            ColumnType::Int => value.as_i64().map(SqlValue::Int),
            ColumnType::Float => value.as_f64().map(SqlValue::Float),
            ColumnType::Bool => value.as_bool().map(SqlValue::Bool),
            ColumnType::Date => value
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
                .map(SqlValue::Date),
            ColumnType::Timestamp => value
                .as_str()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| SqlValue::Timestamp(dt.with_timezone(&Utc))),
            ColumnType::Json => Some(SqlValue::Json(value.clone())),
        }
    }

    /// Append this value to the statement as a bind parameter. `Null` is
    /// pushed as a literal so Postgres never sees an untyped null
    /// parameter.
    pub fn push_bind_to<'args>(self, qb: &mut QueryBuilder<'args, Postgres>) {
        match self {
            SqlValue::Null => {
                qb.push("NULL");
            }
            SqlValue::Bool(v) => {
                qb.push_bind(v);
            }
            SqlValue::Int(v) => {
                qb.push_bind(v);
            }
            SqlValue::Float(v) => {
                qb.push_bind(v);
            }
            SqlValue::Text(v) => {
                qb.push_bind(v);
            }
            SqlValue::Uuid(v) => {
                qb.push_bind(v);
            }
            SqlValue::Date(v) => {
                qb.push_bind(v);
            }
            SqlValue::Timestamp(v) => {
                qb.push_bind(v);
            }
            SqlValue::Json(v) => {
                qb.push_bind(v);
            }
        }
    }
}

/// Decode a row into a JSON object, column by column, using the type the
/// server reported. Unknown types fall back to text; a column that decodes
/// as none of its candidates comes back as JSON null with a warning rather
/// than failing the whole row.
pub fn row_to_json(row: &PgRow) -> Result<Value, DbError> {
    let mut out = Map::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let type_name = column.type_info().name().to_uppercase();

        let value = match type_name.as_str() {
            "BOOL" => row.try_get::<Option<bool>, _>(idx)?.map(Value::from),
            "INT2" | "INT4" => row.try_get::<Option<i32>, _>(idx)?.map(Value::from),
            "INT8" => row.try_get::<Option<i64>, _>(idx)?.map(Value::from),
            "FLOAT4" => row.try_get::<Option<f32>, _>(idx)?.map(Value::from),
            "FLOAT8" => row.try_get::<Option<f64>, _>(idx)?.map(Value::from),
            "UUID" => row
                .try_get::<Option<Uuid>, _>(idx)?
                .map(|u| Value::from(u.to_string())),
            "DATE" => row
                .try_get::<Option<NaiveDate>, _>(idx)?
                .map(|d| Value::from(d.format("%Y-%m-%d").to_string())),
            "TIMESTAMP" => row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|ts| Value::from(ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<Option<DateTime<Utc>>, _>(idx)?
                .map(|ts| Value::from(ts.to_rfc3339())),
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx)?,
            "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(idx)?.map(Value::from)
            }
            other => match row.try_get::<Option<String>, _>(idx) {
                Ok(v) => v.map(Value::from),
                Err(_) => {
                    tracing::warn!(column = %name, pg_type = %other, "undecodable column; emitting null");
                    None
                }
            },
        };

        out.insert(name, value.unwrap_or(Value::Null));
    }

    Ok(Value::Object(out))
}
