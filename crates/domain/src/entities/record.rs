//! Dynamic records exchanged with the tenant-aware repository

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A row keyed by external (camelCase) field names
///
/// Records are the single query surface over the whitelisted tables. Keys are
/// translated to storage column names by the schema guard; values are plain
/// JSON scalars (objects and arrays are persisted as JSON text).
pub type Record = Map<String, Value>;

/// Outcome of an update or delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteResult {
    /// Number of rows touched
    pub changes: u64,
}

impl WriteResult {
    /// Wrap a row count
    pub const fn new(changes: u64) -> Self {
        Self { changes }
    }

    /// Whether nothing matched
    pub const fn is_empty(&self) -> bool {
        self.changes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_result_reports_emptiness() {
        assert!(WriteResult::default().is_empty());
        assert!(!WriteResult::new(3).is_empty());
    }

    #[test]
    fn write_result_serializes_changes() {
        let json = serde_json::to_value(WriteResult::new(2)).unwrap();
        assert_eq!(json, serde_json::json!({ "changes": 2 }));
    }
}
