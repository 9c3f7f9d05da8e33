//! Parameterized SQL generation for whitelisted tables
//!
//! Identifiers reaching this module have already passed the schema guard;
//! every value travels as a bound parameter, never as SQL text.

use std::fmt::Write as _;

use application::OrderTerm;
use domain::ColumnKind;
use serde_json::Value;
use sqlx::{Sqlite, query::Query, sqlite::SqliteArguments};

/// A value bound to a statement parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Convert a JSON value for a column of the given kind
    ///
    /// Booleans are stored as `0`/`1`. Arrays and objects, and anything bound
    /// for a JSON column, are stored as serialized text.
    pub fn from_json(value: &Value, kind: Option<ColumnKind>) -> Self {
        if value.is_null() {
            return Self::Null;
        }
        if kind == Some(ColumnKind::Json) {
            return Self::Text(value.to_string());
        }
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Integer(i64::from(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Real))
                .unwrap_or_else(|| Self::Text(n.to_string())),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

/// One `column = value` term of a WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub value: SqlValue,
}

impl Condition {
    pub fn new(column: impl Into<String>, value: SqlValue) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// SQL text plus its parameters in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Attach the parameters to a sqlx query
    pub fn query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        self.params
            .iter()
            .fold(sqlx::query(&self.sql), |query, param| match param {
                SqlValue::Null => query.bind(Option::<String>::None),
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Real(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.clone()),
            })
    }
}

/// Accumulates SQL text and numbered placeholders
#[derive(Debug, Default)]
struct Builder {
    sql: String,
    params: Vec<SqlValue>,
}

impl Builder {
    fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn push(&mut self, fragment: &str) {
        self.sql.push_str(fragment);
    }

    fn bind(&mut self, value: SqlValue) {
        self.params.push(value);
        let _ = write!(self.sql, "${}", self.params.len());
    }

    fn where_clause(&mut self, conditions: &[Condition]) {
        for (i, condition) in conditions.iter().enumerate() {
            self.push(if i == 0 { " WHERE " } else { " AND " });
            self.push(&condition.column);
            if condition.value == SqlValue::Null {
                self.push(" IS NULL");
            } else {
                self.push(" = ");
                self.bind(condition.value.clone());
            }
        }
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Ordering and paging of a SELECT
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Paging {
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `INSERT ... RETURNING *`
pub fn insert(table: &str, values: &[(String, SqlValue)]) -> Statement {
    let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
    let mut builder = Builder::new(format!("INSERT INTO {table} ({}) VALUES (", columns.join(", ")));
    for (i, (_, value)) in values.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.bind(value.clone());
    }
    builder.push(") RETURNING *");
    builder.finish()
}

/// `SELECT * ... [ORDER BY] [LIMIT] [OFFSET]`
pub fn select(table: &str, conditions: &[Condition], paging: &Paging) -> Statement {
    let mut builder = Builder::new(format!("SELECT * FROM {table}"));
    builder.where_clause(conditions);

    if !paging.order_by.is_empty() {
        let terms: Vec<String> = paging.order_by.iter().map(ToString::to_string).collect();
        builder.push(" ORDER BY ");
        builder.push(&terms.join(", "));
    }

    match (paging.limit, paging.offset) {
        (Some(limit), offset) => {
            builder.push(" LIMIT ");
            builder.bind(SqlValue::Integer(limit));
            if let Some(offset) = offset {
                builder.push(" OFFSET ");
                builder.bind(SqlValue::Integer(offset));
            }
        },
        // SQLite only accepts OFFSET after LIMIT; -1 means unbounded
        (None, Some(offset)) => {
            builder.push(" LIMIT -1 OFFSET ");
            builder.bind(SqlValue::Integer(offset));
        },
        (None, None) => {},
    }
    builder.finish()
}

/// `UPDATE ... SET ... WHERE ...`
pub fn update(table: &str, values: &[(String, SqlValue)], conditions: &[Condition]) -> Statement {
    let mut builder = Builder::new(format!("UPDATE {table} SET "));
    for (i, (column, value)) in values.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(column);
        builder.push(" = ");
        builder.bind(value.clone());
    }
    builder.where_clause(conditions);
    builder.finish()
}

/// `DELETE FROM ... WHERE ...`
pub fn delete(table: &str, conditions: &[Condition]) -> Statement {
    let mut builder = Builder::new(format!("DELETE FROM {table}"));
    builder.where_clause(conditions);
    builder.finish()
}

/// `SELECT COUNT(*) ... WHERE ...`
pub fn count(table: &str, conditions: &[Condition]) -> Statement {
    let mut builder = Builder::new(format!("SELECT COUNT(*) FROM {table}"));
    builder.where_clause(conditions);
    builder.finish()
}

#[cfg(test)]
mod tests {
    use application::SortDirection;
    use serde_json::json;

    use super::*;

    fn tenant() -> Condition {
        Condition::new("tenant_id", SqlValue::Text("t1".to_string()))
    }

    #[test]
    fn json_values_convert_by_kind() {
        assert_eq!(SqlValue::from_json(&json!(true), None), SqlValue::Integer(1));
        assert_eq!(SqlValue::from_json(&json!(2.5), None), SqlValue::Real(2.5));
        assert_eq!(SqlValue::from_json(&json!(7), None), SqlValue::Integer(7));
        assert_eq!(SqlValue::from_json(&json!(null), Some(ColumnKind::Json)), SqlValue::Null);
        assert_eq!(
            SqlValue::from_json(&json!({"a": 1}), None),
            SqlValue::Text(r#"{"a":1}"#.to_string())
        );
        assert_eq!(
            SqlValue::from_json(&json!("x"), Some(ColumnKind::Json)),
            SqlValue::Text(r#""x""#.to_string())
        );
    }

    #[test]
    fn insert_binds_every_value() {
        let stmt = insert(
            "users",
            &[
                ("tenant_id".to_string(), SqlValue::Text("t1".to_string())),
                ("display_name".to_string(), SqlValue::Text("Ada".to_string())),
            ],
        );
        assert_eq!(
            stmt.sql,
            "INSERT INTO users (tenant_id, display_name) VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(stmt.params.len(), 2);
    }

    #[test]
    fn select_renders_null_conditions_and_paging() {
        let paging = Paging {
            order_by: vec![OrderTerm {
                column: "created_at".to_string(),
                direction: SortDirection::Desc,
            }],
            limit: Some(10),
            offset: Some(20),
        };
        let stmt = select(
            "users",
            &[Condition::new("email", SqlValue::Null), tenant()],
            &paging,
        );
        assert_eq!(
            stmt.sql,
            "SELECT * FROM users WHERE email IS NULL AND tenant_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            stmt.params,
            vec![
                SqlValue::Text("t1".to_string()),
                SqlValue::Integer(10),
                SqlValue::Integer(20)
            ]
        );
    }

    #[test]
    fn offset_without_limit_is_unbounded() {
        let paging = Paging {
            offset: Some(5),
            ..Paging::default()
        };
        let stmt = select("users", &[tenant()], &paging);
        assert!(stmt.sql.ends_with("LIMIT -1 OFFSET $2"));
    }

    #[test]
    fn update_places_set_before_where() {
        let stmt = update(
            "receipts",
            &[("status".to_string(), SqlValue::Text("exported".to_string()))],
            &[Condition::new("id", SqlValue::Integer(3)), tenant()],
        );
        assert_eq!(
            stmt.sql,
            "UPDATE receipts SET status = $1 WHERE id = $2 AND tenant_id = $3"
        );
    }

    #[test]
    fn delete_and_count_filter_by_conditions() {
        assert_eq!(
            delete("users", &[tenant()]).sql,
            "DELETE FROM users WHERE tenant_id = $1"
        );
        assert_eq!(
            count("users", &[tenant()]).sql,
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1"
        );
    }
}
