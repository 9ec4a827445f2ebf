//! Generic CRUD operations.
//!
//! Every operation takes a [`TableSpec`] and runs against a [`DbSession`]
//! transaction. Statement construction lives in private builder functions
//! returning a `QueryBuilder`, so the SQL shape is testable without a
//! database; the async wrappers only bind, execute, and decode.
//!
//! Identifier safety: every column name written into SQL text is validated
//! against the table descriptor first. Values always travel as bind
//! parameters.

use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use gatehouse_core::ApiResponse;

use crate::error::DbError;
use crate::session::DbSession;
use crate::table::{ColumnType, Criterion, SoftDeleteSpec, TableSpec};
use crate::value::{SqlValue, row_to_json};

/// Paged query request for [`fetch_pages`].
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub pageindex: i64,
    pub pagesize: i64,
    pub criteria: Vec<Criterion>,
    pub sortby: Option<String>,
    pub descending: bool,
    /// Select the soft-deleted partition instead of the live one.
    pub deleted: bool,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            pageindex: 0,
            pagesize: 10,
            criteria: Vec::new(),
            sortby: None,
            descending: false,
            deleted: false,
        }
    }
}

impl PageRequest {
    /// Clamp to the minimums: index ≥ 0, size ≥ 1.
    pub fn clamped(&self) -> (i64, i64) {
        (self.pageindex.max(0), self.pagesize.max(1))
    }
}

/// Insert `fields` into `table`, generating a primary key when absent.
/// Returns the inserted row, or `None` when `conflict_nothing` suppressed
/// the insert.
pub async fn add(
    session: &mut DbSession,
    table: &TableSpec,
    mut fields: Map<String, Value>,
    conflict_nothing: Option<&str>,
) -> Result<Option<Value>, DbError> {
    if fields.is_empty() {
        return Err(DbError::param("model cannot be empty"));
    }

    if !fields.contains_key(table.primary_key) {
        fields.insert(table.primary_key.to_string(), generated_id(table)?);
    }

    let mut qb = build_insert(table, &fields, conflict_nothing)?;
    let row = qb.build().fetch_optional(session.conn()).await.map_err(DbError::from)?;
    row.as_ref().map(row_to_json).transpose()
}

/// Fetch one row by primary key. `deleted` selects the soft-deleted
/// partition on tables that support it; plain tables ignore it.
pub async fn find(
    session: &mut DbSession,
    table: &TableSpec,
    id: &Value,
    deleted: bool,
) -> Result<Option<Value>, DbError> {
    if id.is_null() {
        return Err(DbError::param("id cannot be null"));
    }

    let mut qb = build_find(table, id, deleted)?;
    let row = qb.build().fetch_optional(session.conn()).await.map_err(DbError::from)?;
    row.as_ref().map(row_to_json).transpose()
}

/// Project `columns` under conjunctive `criteria`, excluding soft-deleted
/// rows when the table supports soft delete.
pub async fn fetch(
    session: &mut DbSession,
    table: &TableSpec,
    columns: &[&str],
    criteria: &[Criterion],
) -> Result<Vec<Value>, DbError> {
    if columns.is_empty() {
        return Err(DbError::param("columns cannot be empty"));
    }

    let mut qb = build_fetch(table, columns, criteria)?;
    let rows = qb.build().fetch_all(session.conn()).await.map_err(DbError::from)?;
    rows.iter().map(row_to_json).collect()
}

/// Update the row addressed by the id field inside `fields`. Returns the
/// affected row count.
pub async fn update(
    session: &mut DbSession,
    table: &TableSpec,
    mut fields: Map<String, Value>,
) -> Result<u64, DbError> {
    let id = match fields.remove(table.primary_key) {
        Some(v) if !v.is_null() => v,
        _ => {
            return Err(DbError::param(format!(
                "Update failed: id is required for {}",
                table.name
            )));
        }
    };
    if fields.is_empty() {
        return Err(DbError::param("update requires at least one field besides the id"));
    }

    let mut qb = build_update(table, &id, &fields)?;
    let result = qb.build().execute(session.conn()).await.map_err(DbError::from)?;
    Ok(result.rows_affected())
}

/// Delete rows by id. Soft-deletes (flag + reason) when the table supports
/// it and `permanent` is not forced; hard-deletes otherwise.
pub async fn delete(
    session: &mut DbSession,
    table: &TableSpec,
    ids: &[Value],
    reason: Option<&str>,
    permanent: bool,
) -> Result<u64, DbError> {
    if ids.is_empty() {
        return Err(DbError::param("id cannot be null"));
    }

    let mut qb = match (table.soft_delete, permanent) {
        (Some(soft), false) => build_soft_delete(table, &soft, ids, reason)?,
        _ => build_hard_delete(table, ids)?,
    };
    let result = qb.build().execute(session.conn()).await.map_err(DbError::from)?;
    Ok(result.rows_affected())
}

/// Clear the soft-delete flag and reason (plus any `extra` fields) for the
/// given ids. Tables without soft-delete support always fail.
pub async fn restore(
    session: &mut DbSession,
    table: &TableSpec,
    ids: &[Value],
    extra: Map<String, Value>,
) -> Result<u64, DbError> {
    let soft = ensure_restorable(table)?;

    if ids.is_empty() {
        return Err(DbError::param("ids cannot be null"));
    }

    let mut qb = build_restore(table, &soft, ids, &extra)?;
    let result = qb.build().execute(session.conn()).await.map_err(DbError::from)?;
    Ok(result.rows_affected())
}

/// Fetch one page of rows plus the total matching count, wrapped in a
/// success envelope.
pub async fn fetch_pages(
    session: &mut DbSession,
    table: &TableSpec,
    page: &PageRequest,
) -> Result<ApiResponse, DbError> {
    let mut count_qb = build_count(table, page)?;
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(session.conn())
        .await
        .map_err(DbError::from)?;

    let mut qb = build_page(table, page)?;
    let rows = qb.build().fetch_all(session.conn()).await.map_err(DbError::from)?;
    let data = rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>()?;

    let resp = ApiResponse::success(data)
        .map_err(|e| DbError::param(e.to_string()))?
        .with_total(total.max(0) as u64);
    Ok(resp)
}

// ─────────────────────────────────────────────────────────────────────────────
// Statement builders
// ─────────────────────────────────────────────────────────────────────────────

/// Capability check for [`restore`]. Runs before any input validation:
/// restore on an unsupported table fails regardless of the rest of the
/// arguments.
fn ensure_restorable(table: &TableSpec) -> Result<SoftDeleteSpec, DbError> {
    table.soft_delete.ok_or(DbError::RestoreUnsupported)
}

fn generated_id(table: &TableSpec) -> Result<Value, DbError> {
    let pk = table.primary_key_column()?;
    match pk.ty {
        ColumnType::Uuid | ColumnType::Text => Ok(Value::from(Uuid::now_v7().to_string())),
        _ => Err(DbError::param(format!(
            "cannot generate an id for primary key '{}' of {}",
            table.primary_key, table.name
        ))),
    }
}

fn build_insert(
    table: &TableSpec,
    fields: &Map<String, Value>,
    conflict_nothing: Option<&str>,
) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let mut converted = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        converted.push((name.as_str(), table.convert(name, value)?));
    }

    let mut qb = QueryBuilder::new(format!("INSERT INTO {} (", table.name));
    for (i, (name, _)) in converted.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        qb.push(*name);
    }
    qb.push(") VALUES (");
    for (i, (_, value)) in converted.into_iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        value.push_bind_to(&mut qb);
    }
    qb.push(")");

    if let Some(target) = conflict_nothing {
        if !table.has_column(target) {
            return Err(DbError::invalid_column(format!("Invalid column: {target}")));
        }
        qb.push(format!(" ON CONFLICT ({target}) DO NOTHING"));
    }

    qb.push(" RETURNING *");
    Ok(qb)
}

fn build_find(
    table: &TableSpec,
    id: &Value,
    deleted: bool,
) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let id_value = table.convert(table.primary_key, id)?;

    let mut qb = QueryBuilder::new(format!("SELECT * FROM {} WHERE {} = ", table.name, table.primary_key));
    id_value.push_bind_to(&mut qb);

    if let Some(soft) = &table.soft_delete {
        qb.push(format!(" AND {} = ", soft.flag));
        qb.push_bind(deleted);
    }
    Ok(qb)
}

fn build_fetch(
    table: &TableSpec,
    columns: &[&str],
    criteria: &[Criterion],
) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    for column in columns {
        if !table.has_column(column) {
            return Err(DbError::invalid_column(format!("Invalid column: {column}")));
        }
    }

    let mut qb = QueryBuilder::new(format!("SELECT {} FROM {}", columns.join(", "), table.name));
    push_where(&mut qb, table, criteria, table.soft_delete.map(|_| false))?;
    Ok(qb)
}

fn build_update(
    table: &TableSpec,
    id: &Value,
    fields: &Map<String, Value>,
) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let id_value = table.convert(table.primary_key, id)?;

    let mut qb = QueryBuilder::new(format!("UPDATE {} SET ", table.name));
    for (i, (name, value)) in fields.iter().enumerate() {
        let converted = table.convert(name, value)?;
        if i > 0 {
            qb.push(", ");
        }
        qb.push(format!("{name} = "));
        converted.push_bind_to(&mut qb);
    }

    qb.push(format!(" WHERE {} = ", table.primary_key));
    id_value.push_bind_to(&mut qb);
    Ok(qb)
}

fn build_soft_delete(
    table: &TableSpec,
    soft: &SoftDeleteSpec,
    ids: &[Value],
    reason: Option<&str>,
) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let mut qb = QueryBuilder::new(format!(
        "UPDATE {} SET {} = TRUE, {} = ",
        table.name, soft.flag, soft.reason
    ));
    match reason {
        Some(reason) => SqlValue::Text(reason.to_string()).push_bind_to(&mut qb),
        None => SqlValue::Null.push_bind_to(&mut qb),
    }
    push_id_list(&mut qb, table, ids)?;
    Ok(qb)
}

fn build_hard_delete(
    table: &TableSpec,
    ids: &[Value],
) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let mut qb = QueryBuilder::new(format!("DELETE FROM {}", table.name));
    push_id_list(&mut qb, table, ids)?;
    Ok(qb)
}

fn build_restore(
    table: &TableSpec,
    soft: &SoftDeleteSpec,
    ids: &[Value],
    extra: &Map<String, Value>,
) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let mut qb = QueryBuilder::new(format!(
        "UPDATE {} SET {} = FALSE, {} = NULL",
        table.name, soft.flag, soft.reason
    ));
    for (name, value) in extra {
        let converted = table.convert(name, value)?;
        qb.push(format!(", {name} = "));
        converted.push_bind_to(&mut qb);
    }
    push_id_list(&mut qb, table, ids)?;
    Ok(qb)
}

fn build_count(table: &TableSpec, page: &PageRequest) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table.name));
    push_where(&mut qb, table, &page.criteria, table.soft_delete.map(|_| page.deleted))?;
    Ok(qb)
}

fn build_page(table: &TableSpec, page: &PageRequest) -> Result<QueryBuilder<'static, Postgres>, DbError> {
    let (index, size) = page.clamped();

    let mut qb = QueryBuilder::new(format!("SELECT * FROM {}", table.name));
    push_where(&mut qb, table, &page.criteria, table.soft_delete.map(|_| page.deleted))?;

    if let Some(sortby) = &page.sortby {
        if !table.has_column(sortby) {
            return Err(DbError::invalid_column(format!("Invalid sort column: {sortby}")));
        }
        let direction = if page.descending { "DESC" } else { "ASC" };
        qb.push(format!(" ORDER BY {sortby} {direction}"));
    }

    qb.push(" LIMIT ");
    qb.push_bind(size);
    qb.push(" OFFSET ");
    qb.push_bind(index * size);
    Ok(qb)
}

/// Append `WHERE` with the conjunctive criteria and (when the table has
/// soft delete) the partition filter.
fn push_where(
    qb: &mut QueryBuilder<'static, Postgres>,
    table: &TableSpec,
    criteria: &[Criterion],
    deleted: Option<bool>,
) -> Result<(), DbError> {
    let soft = table.soft_delete;
    if criteria.is_empty() && (soft.is_none() || deleted.is_none()) {
        return Ok(());
    }

    qb.push(" WHERE ");
    let mut first = true;

    for criterion in criteria {
        let value = table.convert(&criterion.column, &criterion.value)?;
        if !first {
            qb.push(" AND ");
        }
        first = false;
        qb.push(format!("{} {} ", criterion.column, criterion.op.as_sql()));
        value.push_bind_to(qb);
    }

    if let (Some(soft), Some(deleted)) = (soft, deleted) {
        if !first {
            qb.push(" AND ");
        }
        qb.push(format!("{} = ", soft.flag));
        qb.push_bind(deleted);
    }

    Ok(())
}

fn push_id_list(
    qb: &mut QueryBuilder<'static, Postgres>,
    table: &TableSpec,
    ids: &[Value],
) -> Result<(), DbError> {
    qb.push(format!(" WHERE {} IN (", table.primary_key));
    for (i, id) in ids.iter().enumerate() {
        let converted = table.convert(table.primary_key, id)?;
        if i > 0 {
            qb.push(", ");
        }
        converted.push_bind_to(qb);
    }
    qb.push(")");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, CompareOp};
    use serde_json::json;

    const NOTES: TableSpec = TableSpec {
        name: "notes",
        primary_key: "id",
        columns: &[
            Column::new("id", ColumnType::Uuid),
            Column::new("label", ColumnType::Text),
            Column::new("rank", ColumnType::Int),
            Column::new("is_deleted", ColumnType::Bool),
            Column::new("delete_reason", ColumnType::Text),
        ],
        soft_delete: Some(SoftDeleteSpec {
            flag: "is_deleted",
            reason: "delete_reason",
        }),
    };

    const PLAIN: TableSpec = TableSpec {
        name: "plain",
        primary_key: "id",
        columns: &[
            Column::new("id", ColumnType::Uuid),
            Column::new("label", ColumnType::Text),
        ],
        soft_delete: None,
    };

    const ID: &str = "0193e5a8-59f8-7a9f-bd1a-25b1cdd5ba5b";

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    #[test]
    fn insert_lists_columns_and_returns_row() {
        let qb = build_insert(&NOTES, &fields(&[("id", json!(ID)), ("label", json!("a"))]), None).unwrap();
        assert_eq!(
            qb.into_sql(),
            "INSERT INTO notes (id, label) VALUES ($1, $2) RETURNING *"
        );
    }

    #[test]
    fn insert_with_conflict_target() {
        let qb = build_insert(&NOTES, &fields(&[("id", json!(ID))]), Some("label")).unwrap();
        assert_eq!(
            qb.into_sql(),
            "INSERT INTO notes (id) VALUES ($1) ON CONFLICT (label) DO NOTHING RETURNING *"
        );
        assert!(build_insert(&NOTES, &fields(&[("id", json!(ID))]), Some("nope")).is_err());
    }

    #[test]
    fn insert_rejects_unknown_columns() {
        let err = build_insert(&NOTES, &fields(&[("evil; DROP", json!("x"))]), None).err().unwrap();
        assert!(err.to_string().starts_with("Invalid column"));
    }

    #[test]
    fn generated_id_needs_a_textual_key() {
        assert!(generated_id(&NOTES).is_ok());

        const INT_PK: TableSpec = TableSpec {
            name: "counters",
            primary_key: "n",
            columns: &[Column::new("n", ColumnType::Int)],
            soft_delete: None,
        };
        assert!(generated_id(&INT_PK).is_err());
    }

    #[test]
    fn find_filters_the_live_partition() {
        let qb = build_find(&NOTES, &json!(ID), false).unwrap();
        assert_eq!(qb.into_sql(), "SELECT * FROM notes WHERE id = $1 AND is_deleted = $2");
    }

    #[test]
    fn find_on_a_plain_table_has_no_flag() {
        let qb = build_find(&PLAIN, &json!(ID), false).unwrap();
        assert_eq!(qb.into_sql(), "SELECT * FROM plain WHERE id = $1");
    }

    #[test]
    fn fetch_projects_and_excludes_deleted() {
        let qb = build_fetch(
            &NOTES,
            &["id", "label"],
            &[Criterion::new("label", CompareOp::Like, "a%")],
        )
        .unwrap();
        assert_eq!(
            qb.into_sql(),
            "SELECT id, label FROM notes WHERE label LIKE $1 AND is_deleted = $2"
        );
    }

    #[test]
    fn fetch_rejects_unknown_projection_columns() {
        assert!(build_fetch(&NOTES, &["nope"], &[]).is_err());
    }

    #[test]
    fn update_sets_fields_and_addresses_by_id() {
        let qb = build_update(
            &NOTES,
            &json!(ID),
            &fields(&[("label", json!("renamed")), ("rank", json!(2))]),
        )
        .unwrap();
        assert_eq!(qb.into_sql(), "UPDATE notes SET label = $1, rank = $2 WHERE id = $3");
    }

    #[test]
    fn soft_delete_marks_flag_and_reason() {
        let soft = NOTES.soft_delete.unwrap();
        let qb = build_soft_delete(&NOTES, &soft, &[json!(ID), json!(ID)], Some("cleanup")).unwrap();
        assert_eq!(
            qb.into_sql(),
            "UPDATE notes SET is_deleted = TRUE, delete_reason = $1 WHERE id IN ($2, $3)"
        );

        let qb = build_soft_delete(&NOTES, &soft, &[json!(ID)], None).unwrap();
        assert_eq!(
            qb.into_sql(),
            "UPDATE notes SET is_deleted = TRUE, delete_reason = NULL WHERE id IN ($1)"
        );
    }

    #[test]
    fn hard_delete_removes_rows() {
        let qb = build_hard_delete(&NOTES, &[json!(ID)]).unwrap();
        assert_eq!(qb.into_sql(), "DELETE FROM notes WHERE id IN ($1)");
    }

    #[test]
    fn restore_clears_flag_reason_and_extras() {
        let soft = NOTES.soft_delete.unwrap();
        let qb = build_restore(&NOTES, &soft, &[json!(ID)], &fields(&[("label", json!("back"))])).unwrap();
        assert_eq!(
            qb.into_sql(),
            "UPDATE notes SET is_deleted = FALSE, delete_reason = NULL, label = $1 WHERE id IN ($2)"
        );
    }

    #[test]
    fn page_clamps_index_and_size() {
        let page = PageRequest {
            pageindex: -1,
            pagesize: 0,
            ..Default::default()
        };
        assert_eq!(page.clamped(), (0, 1));

        let page = PageRequest {
            pageindex: 3,
            pagesize: 25,
            ..Default::default()
        };
        assert_eq!(page.clamped(), (3, 25));
    }

    #[test]
    fn page_query_orders_filters_and_paginates() {
        let page = PageRequest {
            pageindex: 2,
            pagesize: 5,
            criteria: vec![Criterion::eq("label", "a")],
            sortby: Some("rank".into()),
            descending: true,
            deleted: false,
        };
        let qb = build_page(&NOTES, &page).unwrap();
        assert_eq!(
            qb.into_sql(),
            "SELECT * FROM notes WHERE label = $1 AND is_deleted = $2 ORDER BY rank DESC LIMIT $3 OFFSET $4"
        );

        let count = build_count(&NOTES, &page).unwrap();
        assert_eq!(
            count.into_sql(),
            "SELECT COUNT(*) FROM notes WHERE label = $1 AND is_deleted = $2"
        );
    }

    #[test]
    fn page_on_plain_table_can_skip_where() {
        let qb = build_page(&PLAIN, &PageRequest::default()).unwrap();
        assert_eq!(qb.into_sql(), "SELECT * FROM plain LIMIT $1 OFFSET $2");
    }

    #[test]
    fn invalid_sort_column_is_named() {
        let page = PageRequest {
            sortby: Some("nope".into()),
            ..Default::default()
        };
        let err = build_page(&NOTES, &page).err().unwrap();
        assert_eq!(err.to_string(), "Invalid sort column: nope");
    }

    #[test]
    fn unknown_criterion_column_is_rejected() {
        let page = PageRequest {
            criteria: vec![Criterion::eq("nope", "x")],
            ..Default::default()
        };
        assert!(build_count(&NOTES, &page).is_err());
    }

    #[test]
    fn restore_always_fails_without_soft_delete_support() {
        let err = ensure_restorable(&PLAIN).unwrap_err();
        assert_eq!(err.to_string(), "This table does not support restore operation");
        assert!(ensure_restorable(&NOTES).is_ok());
    }
}
