//! Static schema of every table reachable through the tenant-aware repository
//!
//! Each table is described once, at compile time, by a [`TableSchema`]. The
//! schema guard derives both translation directions (external camelCase →
//! storage snake_case and back) from these definitions, so the two maps can
//! never drift apart.
//!
//! `counters` and `resource_locks` are intentionally absent: only the
//! concurrency primitives may write them.

use serde::Serialize;

/// Storage column holding the owning tenant
pub const TENANT_COLUMN: &str = "tenant_id";
/// External field name of the owning tenant
pub const TENANT_FIELD: &str = "tenantId";
/// Generated primary key column
pub const ID_COLUMN: &str = "id";
/// Row creation timestamp column
pub const CREATED_AT_COLUMN: &str = "created_at";
/// Row modification timestamp column
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// How a column's values are stored and decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Real,
    Text,
    /// Stored as `0`/`1`, surfaced as JSON booleans
    Boolean,
    /// RFC 3339 text
    Timestamp,
    /// Serialized JSON text, surfaced as structured JSON
    Json,
}

/// One column of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDef {
    /// Name used by callers
    pub external: &'static str,
    /// Name used in storage
    pub column: &'static str,
    pub kind: ColumnKind,
}

const fn field(external: &'static str, column: &'static str, kind: ColumnKind) -> FieldDef {
    FieldDef {
        external,
        column,
        kind,
    }
}

/// Columns every whitelisted table carries
pub const COMMON_FIELDS: &[FieldDef] = &[
    field("id", ID_COLUMN, ColumnKind::Integer),
    field(TENANT_FIELD, TENANT_COLUMN, ColumnKind::Text),
    field("createdAt", CREATED_AT_COLUMN, ColumnKind::Timestamp),
    field("updatedAt", UPDATED_AT_COLUMN, ColumnKind::Timestamp),
];

/// A whitelisted table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// Table name in storage
    pub name: &'static str,
    /// Entity kind used to request a repository for this table (e.g. `"user"`)
    pub entity: &'static str,
    /// Table-specific columns, in addition to [`COMMON_FIELDS`]
    pub fields: &'static [FieldDef],
}

impl TableSchema {
    /// Common and table-specific columns
    pub fn all_fields(&self) -> impl Iterator<Item = &'static FieldDef> {
        COMMON_FIELDS.iter().chain(self.fields.iter())
    }

    /// Look up a column by its external name
    pub fn field_by_external(&self, external: &str) -> Option<&'static FieldDef> {
        self.all_fields().find(|f| f.external == external)
    }

    /// Look up a column by its storage name
    pub fn field_by_column(&self, column: &str) -> Option<&'static FieldDef> {
        self.all_fields().find(|f| f.column == column)
    }
}

pub const USERS: TableSchema = TableSchema {
    name: "users",
    entity: "user",
    fields: &[
        field("phoneNumber", "phone_number", ColumnKind::Text),
        field("displayName", "display_name", ColumnKind::Text),
        field("email", "email", ColumnKind::Text),
        field("role", "role", ColumnKind::Text),
        field("isActive", "is_active", ColumnKind::Boolean),
    ],
};

pub const RECEIPTS: TableSchema = TableSchema {
    name: "receipts",
    entity: "receipt",
    fields: &[
        field("userId", "user_id", ColumnKind::Text),
        field("receiptNumber", "receipt_number", ColumnKind::Text),
        field("merchantName", "merchant_name", ColumnKind::Text),
        field("totalAmount", "total_amount", ColumnKind::Real),
        field("currency", "currency", ColumnKind::Text),
        field("issuedAt", "issued_at", ColumnKind::Text),
        field("categoryId", "category_id", ColumnKind::Integer),
        field("status", "status", ColumnKind::Text),
        field("rawFields", "raw_fields", ColumnKind::Json),
    ],
};

pub const CATEGORIES: TableSchema = TableSchema {
    name: "categories",
    entity: "category",
    fields: &[
        field("name", "name", ColumnKind::Text),
        field("parentId", "parent_id", ColumnKind::Integer),
        field("monthlyBudget", "monthly_budget", ColumnKind::Real),
    ],
};

pub const CHAT_SESSIONS: TableSchema = TableSchema {
    name: "chat_sessions",
    entity: "chat_session",
    fields: &[
        field("userId", "user_id", ColumnKind::Text),
        field("phoneNumber", "phone_number", ColumnKind::Text),
        field("state", "state", ColumnKind::Text),
        field("lastMessageAt", "last_message_at", ColumnKind::Timestamp),
        field("pendingAction", "pending_action", ColumnKind::Json),
    ],
};

pub const EXPORT_TARGETS: TableSchema = TableSchema {
    name: "export_targets",
    entity: "export_target",
    fields: &[
        field("spreadsheetId", "spreadsheet_id", ColumnKind::Text),
        field("sheetName", "sheet_name", ColumnKind::Text),
        field("isEnabled", "is_enabled", ColumnKind::Boolean),
        field("lastExportedAt", "last_exported_at", ColumnKind::Timestamp),
    ],
};

/// The table whitelist
pub static TABLES: &[TableSchema] = &[USERS, RECEIPTS, CATEGORIES, CHAT_SESSIONS, EXPORT_TARGETS];

/// Find a whitelisted table by exact storage name
pub fn find_table(name: &str) -> Option<&'static TableSchema> {
    TABLES.iter().find(|t| t.name == name)
}

/// Find a whitelisted table by entity kind
pub fn table_for_entity(entity: &str) -> Option<&'static TableSchema> {
    TABLES.iter().find(|t| t.entity == entity)
}
