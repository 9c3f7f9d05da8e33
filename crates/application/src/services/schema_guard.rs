//! Whitelist and pattern gate in front of every dynamic query
//!
//! Table names are checked against a fixed whitelist after a case-insensitive
//! deny-list scan; column names, order-by expressions, limits and offsets must
//! match strict identifier or numeric patterns. Field name translation between
//! external (camelCase) and storage (snake_case) names is derived once from the
//! static [`TableSchema`] definitions in both directions.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use aho_corasick::AhoCorasick;
use domain::{ColumnKind, FieldDef, Record, TableSchema, schema};

use crate::error::ApplicationError;

/// Upper bound on `limit` unless configured otherwise
pub const DEFAULT_MAX_LIMIT: i64 = 1000;

/// Longest accepted identifier
const MAX_IDENTIFIER_LEN: usize = 64;

/// Most terms accepted in one order-by expression
const MAX_ORDER_TERMS: usize = 4;

/// Longest accepted numeric token (keeps values inside `i64`)
const MAX_NUMERIC_DIGITS: usize = 18;

/// Tokens that never appear in a legitimate table name
const DENIED_TOKENS: &[&str] = &[
    ";", "--", "/*", "*/", "'", "\"", "`", "\\", "=", "(", ")", " ", "drop", "delete", "insert",
    "update", "alter", "truncate", "exec", "union", "select", "attach", "pragma", "xp_",
];

/// Pre-compiled Aho-Corasick automaton for the deny-list
static DENY_MATCHER: LazyLock<AhoCorasick> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Infallible with valid static patterns
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .build(DENIED_TOKENS)
        .expect("Failed to build deny-list matcher")
});

/// Sort direction of one order-by term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A validated `column [ASC|DESC]` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub direction: SortDirection,
}

impl fmt::Display for OrderTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, self.direction.as_sql())
    }
}

/// Field translation rules of one whitelisted table
#[derive(Debug)]
pub struct TableRules {
    schema: &'static TableSchema,
    by_external: HashMap<&'static str, &'static FieldDef>,
    by_column: HashMap<&'static str, &'static FieldDef>,
}

impl TableRules {
    fn compile(schema: &'static TableSchema) -> Self {
        let by_external = schema.all_fields().map(|f| (f.external, f)).collect();
        let by_column = schema.all_fields().map(|f| (f.column, f)).collect();
        Self {
            schema,
            by_external,
            by_column,
        }
    }

    /// The static definition these rules were built from
    pub const fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    /// Storage table name
    pub const fn table(&self) -> &'static str {
        self.schema.name
    }

    /// Storage name for an external key; unknown keys pass through unchanged
    pub fn storage_name<'a>(&self, external: &'a str) -> &'a str {
        self.by_external
            .get(external)
            .map_or(external, |f| f.column)
    }

    /// External name for a storage column; unknown columns pass through unchanged
    pub fn external_name<'a>(&self, column: &'a str) -> &'a str {
        self.by_column.get(column).map_or(column, |f| f.external)
    }

    /// Storage column a caller key refers to
    ///
    /// SQLite matches column names case-insensitively, so `ID` or
    /// `Tenant_Id` address the same column as `id` and `tenant_id`. Keys
    /// naming no declared column resolve to `None`.
    pub fn resolve_column(&self, key: &str) -> Option<&'static str> {
        if let Some(field) = self.by_external.get(key) {
            return Some(field.column);
        }
        self.schema
            .all_fields()
            .find(|f| f.column.eq_ignore_ascii_case(key) || f.external.eq_ignore_ascii_case(key))
            .map(|f| f.column)
    }

    /// Translate caller keys to canonical storage columns
    ///
    /// Unlike [`to_storage`](Self::to_storage), declared columns are matched
    /// regardless of case. Undeclared keys pass through unchanged.
    pub fn to_columns(&self, record: Record) -> Record {
        record
            .into_iter()
            .map(|(key, value)| match self.resolve_column(&key) {
                Some(column) => (column.to_string(), value),
                None => (key, value),
            })
            .collect()
    }

    /// Declared kind of a storage column
    pub fn column_kind(&self, column: &str) -> Option<ColumnKind> {
        self.by_column.get(column).map(|f| f.kind)
    }

    /// Translate external keys to storage column names
    ///
    /// A key that already is a storage name (`display_name`) is left as is,
    /// so a round trip through [`from_storage`](Self::from_storage) returns
    /// it under its external name (`displayName`). Records come back in
    /// external form regardless of which form they went in with.
    pub fn to_storage(&self, record: Record) -> Record {
        record
            .into_iter()
            .map(|(key, value)| (self.storage_name(&key).to_string(), value))
            .collect()
    }

    /// Translate storage column names back to external keys
    pub fn from_storage(&self, row: Record) -> Record {
        row.into_iter()
            .map(|(key, value)| (self.external_name(&key).to_string(), value))
            .collect()
    }

    /// Translate validated order-by terms to storage column names
    pub fn order_terms_to_storage(&self, terms: Vec<OrderTerm>) -> Vec<OrderTerm> {
        terms
            .into_iter()
            .map(|term| OrderTerm {
                column: self.storage_name(&term.column).to_string(),
                direction: term.direction,
            })
            .collect()
    }
}

/// Validates every dynamic identifier before a query is built
#[derive(Debug)]
pub struct SchemaGuard {
    tables: HashMap<&'static str, TableRules>,
    max_limit: i64,
}

impl Default for SchemaGuard {
    fn default() -> Self {
        Self::new(schema::TABLES, DEFAULT_MAX_LIMIT)
    }
}

impl SchemaGuard {
    /// Build a guard over the given whitelist
    pub fn new(tables: &'static [TableSchema], max_limit: i64) -> Self {
        let tables = tables
            .iter()
            .map(|schema| (schema.name, TableRules::compile(schema)))
            .collect();
        Self {
            tables,
            max_limit: max_limit.max(1),
        }
    }

    /// Largest accepted `limit`
    pub const fn max_limit(&self) -> i64 {
        self.max_limit
    }

    /// Whitelisted tables, sorted by name
    pub fn tables(&self) -> Vec<&'static TableSchema> {
        let mut tables: Vec<_> = self.tables.values().map(TableRules::schema).collect();
        tables.sort_by_key(|t| t.name);
        tables
    }

    /// Check a table name against the deny-list and the whitelist
    pub fn validate_table(&self, name: &str) -> Result<&TableRules, ApplicationError> {
        if DENY_MATCHER.is_match(name) {
            return Err(ApplicationError::TableNotAllowed(name.to_string()));
        }
        self.tables
            .get(name)
            .ok_or_else(|| ApplicationError::TableNotAllowed(name.to_string()))
    }

    /// Resolve an entity kind such as `"user"` to its table
    pub fn resolve_entity(&self, entity: &str) -> Result<&TableRules, ApplicationError> {
        self.tables
            .values()
            .find(|rules| rules.schema.entity == entity)
            .ok_or_else(|| ApplicationError::TableNotAllowed(entity.to_string()))
    }

    /// Translate a record's external keys to storage names
    pub fn map_to_storage_fields(
        &self,
        table: &str,
        record: Record,
    ) -> Result<Record, ApplicationError> {
        Ok(self.validate_table(table)?.to_storage(record))
    }

    /// Translate a stored row's columns back to external keys
    pub fn map_from_storage_fields(
        &self,
        table: &str,
        row: Record,
    ) -> Result<Record, ApplicationError> {
        Ok(self.validate_table(table)?.from_storage(row))
    }

    /// Accept only `[A-Za-z_][A-Za-z0-9_]*` column names
    pub fn validate_column<'a>(&self, name: &'a str) -> Result<&'a str, ApplicationError> {
        if is_identifier(name) {
            Ok(name)
        } else {
            Err(ApplicationError::UnsafeQueryFragment(format!(
                "column name {name:?}"
            )))
        }
    }

    /// Parse `col [ASC|DESC] {, col [ASC|DESC]}`
    pub fn validate_order_by(&self, expr: &str) -> Result<Vec<OrderTerm>, ApplicationError> {
        let unsafe_fragment =
            || ApplicationError::UnsafeQueryFragment(format!("order by {expr:?}"));

        let terms: Vec<&str> = expr.split(',').map(str::trim).collect();
        if terms.len() > MAX_ORDER_TERMS {
            return Err(unsafe_fragment());
        }

        terms
            .into_iter()
            .map(|term| {
                let mut tokens = term.split_whitespace();
                let column = tokens
                    .next()
                    .filter(|c| is_identifier(c))
                    .ok_or_else(unsafe_fragment)?;
                let direction = match tokens.next() {
                    None => SortDirection::Asc,
                    Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
                    Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                    Some(_) => return Err(unsafe_fragment()),
                };
                if tokens.next().is_some() {
                    return Err(unsafe_fragment());
                }
                Ok(OrderTerm {
                    column: column.to_string(),
                    direction,
                })
            })
            .collect()
    }

    /// Accept `1..=max_limit`
    pub fn validate_limit(&self, limit: i64) -> Result<i64, ApplicationError> {
        if (1..=self.max_limit).contains(&limit) {
            Ok(limit)
        } else {
            Err(ApplicationError::UnsafeQueryFragment(format!(
                "limit {limit}"
            )))
        }
    }

    /// Accept any non-negative offset
    pub fn validate_offset(&self, offset: i64) -> Result<i64, ApplicationError> {
        if offset >= 0 {
            Ok(offset)
        } else {
            Err(ApplicationError::UnsafeQueryFragment(format!(
                "offset {offset}"
            )))
        }
    }
}

/// Parse a raw numeric token made of ASCII digits only
///
/// Used where limits and offsets arrive as text, e.g. from query strings.
pub fn parse_numeric_token(raw: &str) -> Result<i64, ApplicationError> {
    let unsafe_fragment = || ApplicationError::UnsafeQueryFragment(format!("number {raw:?}"));
    if raw.is_empty() || raw.len() > MAX_NUMERIC_DIGITS || !raw.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(unsafe_fragment());
    }
    raw.parse().map_err(|_| unsafe_fragment())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
