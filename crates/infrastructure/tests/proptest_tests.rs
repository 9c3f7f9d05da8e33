//! Property-based tests for SQL generation
//!
//! Values must only ever reach SQLite as bound parameters.

use infrastructure::persistence::query_builder::{self, Condition, Paging, SqlValue};
use proptest::prelude::*;

fn hostile_text() -> impl Strategy<Value = String> {
    "[a-z ;=-]{0,16}".prop_map(|tail| format!("'{tail}"))
}

fn conditions(values: &[String]) -> Vec<Condition> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Condition::new(format!("col_{i}"), SqlValue::Text(v.clone())))
        .collect()
}

fn placeholder_count(sql: &str) -> usize {
    sql.matches('$').count()
}

// ============================================================================
// Parameter Binding Property Tests
// ============================================================================

mod binding_tests {
    use super::*;

    proptest! {
        #[test]
        fn select_never_inlines_values(
            values in proptest::collection::vec(hostile_text(), 1..6),
            limit in proptest::option::of(1i64..1000),
            offset in proptest::option::of(0i64..1000)
        ) {
            let paging = Paging { order_by: Vec::new(), limit, offset };
            let stmt = query_builder::select("users", &conditions(&values), &paging);

            prop_assert!(!stmt.sql.contains('\''));
            prop_assert_eq!(placeholder_count(&stmt.sql), stmt.params.len());
            let expected = values.len() + usize::from(limit.is_some()) + usize::from(offset.is_some());
            prop_assert_eq!(stmt.params.len(), expected);
        }

        #[test]
        fn insert_and_update_bind_every_value(values in proptest::collection::vec(hostile_text(), 1..6)) {
            let pairs: Vec<(String, SqlValue)> = values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("col_{i}"), SqlValue::Text(v.clone())))
                .collect();

            let insert = query_builder::insert("categories", &pairs);
            prop_assert!(!insert.sql.contains('\''));
            prop_assert_eq!(insert.params.len(), values.len());

            let update = query_builder::update("categories", &pairs, &conditions(&values));
            prop_assert!(!update.sql.contains('\''));
            prop_assert_eq!(placeholder_count(&update.sql), values.len() * 2);
        }

        #[test]
        fn null_conditions_bind_nothing(nulls in 1usize..5) {
            let terms: Vec<Condition> = (0..nulls)
                .map(|i| Condition::new(format!("col_{i}"), SqlValue::Null))
                .collect();
            let stmt = query_builder::count("receipts", &terms);
            prop_assert!(stmt.params.is_empty());
            prop_assert_eq!(stmt.sql.matches("IS NULL").count(), nulls);
        }
    }
}
