//! Table descriptors and filter criteria.
//!
//! A [`TableSpec`] is the static description the generic CRUD layer works
//! against: table name, primary key, typed column list, and (optionally)
//! the soft-delete columns. Every column name reaching SQL text is checked
//! against the descriptor, so request input can never inject identifiers.

use serde_json::Value;

use crate::error::DbError;
use crate::value::SqlValue;

/// Declared type of a column; drives JSON → bind-parameter conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Int,
    Float,
    Bool,
    Date,
    Timestamp,
    Json,
}

/// One declared column.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl Column {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// Soft-delete support: a boolean flag column plus a reason column.
#[derive(Debug, Clone, Copy)]
pub struct SoftDeleteSpec {
    pub flag: &'static str,
    pub reason: &'static str,
}

/// Static description of a table the CRUD layer may operate on.
#[derive(Debug, Clone, Copy)]
pub struct TableSpec {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [Column],
    pub soft_delete: Option<SoftDeleteSpec>,
}

impl TableSpec {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn supports_soft_delete(&self) -> bool {
        self.soft_delete.is_some()
    }

    /// Column type of the primary key. Descriptors are authored with the pk
    /// present in `columns`; a descriptor violating that is a programming
    /// error surfaced as a param failure.
    pub fn primary_key_column(&self) -> Result<&Column, DbError> {
        self.column(self.primary_key).ok_or_else(|| {
            DbError::param(format!(
                "table '{}' does not declare its primary key column '{}'",
                self.name, self.primary_key
            ))
        })
    }

    /// Convert one JSON field into a typed bind value for `column`.
    pub fn convert(&self, column: &str, value: &Value) -> Result<SqlValue, DbError> {
        let col = self
            .column(column)
            .ok_or_else(|| DbError::invalid_column(format!("Invalid column: {column}")))?;
        SqlValue::from_json(value, col.ty)
            .ok_or_else(|| DbError::invalid_column(format!("Invalid value for column '{column}'")))
    }
}

/// Comparison operator for a [`Criterion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl CompareOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// One conjunctive filter term. Criteria always combine with `AND`.
#[derive(Debug, Clone)]
pub struct Criterion {
    pub column: String,
    pub op: CompareOp,
    pub value: Value,
}

impl Criterion {
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }

    pub fn like(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Like, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: TableSpec = TableSpec {
        name: "things",
        primary_key: "id",
        columns: &[
            Column::new("id", ColumnType::Uuid),
            Column::new("label", ColumnType::Text),
            Column::new("count", ColumnType::Int),
        ],
        soft_delete: None,
    };

    #[test]
    fn unknown_column_is_rejected() {
        let err = SAMPLE.convert("nope", &json!("x")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid column: nope");
    }

    #[test]
    fn mistyped_value_is_rejected() {
        let err = SAMPLE.convert("count", &json!("not a number")).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for column 'count'");
    }

    #[test]
    fn typed_conversion_succeeds() {
        assert!(matches!(
            SAMPLE.convert("count", &json!(7)).unwrap(),
            SqlValue::Int(7)
        ));
        assert!(matches!(
            SAMPLE
                .convert("id", &json!("0193e5a8-59f8-7a9f-bd1a-25b1cdd5ba5b"))
                .unwrap(),
            SqlValue::Uuid(_)
        ));
    }
}
