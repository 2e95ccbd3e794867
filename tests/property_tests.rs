//! Property-based tests for identifier validation and statement compilation
//!
//! These tests check that:
//! - Anything outside the identifier alphabet is rejected before it can reach SQL text
//! - Accepted identifiers always come back backtick-quoted
//! - Filter maps compile to clauses and parameters in key order

#[cfg(test)]
mod tests {
    use mysqladm::sql::{quote_ident, Compiler};
    use mysqladm::validation::{is_valid_identifier, Validator};
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    fn compiler() -> Compiler {
        Compiler::new(Validator::default(), 1000)
    }

    fn arb_identifier() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_-]{1,32}"
    }

    /// Identifier with at least one character outside the allowed alphabet
    fn arb_hostile_identifier() -> impl Strategy<Value = String> {
        (
            "[A-Za-z0-9_]{0,8}",
            prop_oneof![
                Just(" "),
                Just("`"),
                Just("'"),
                Just(";"),
                Just("."),
                Just("("),
                Just("*"),
                Just("\n"),
                Just("é"),
            ],
            "[A-Za-z0-9_]{0,8}",
        )
            .prop_map(|(head, bad, tail)| format!("{}{}{}", head, bad, tail))
    }

    fn arb_filter() -> impl Strategy<Value = Map<String, Value>> {
        prop::collection::btree_map(arb_identifier(), any::<i64>(), 1..6).prop_map(|entries| {
            entries
                .into_iter()
                .map(|(key, value)| (key, json!(value)))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_valid_identifiers_are_accepted_and_quoted(name in arb_identifier()) {
            prop_assert!(is_valid_identifier(&name));

            let statement = compiler().truncate(&name).unwrap();
            prop_assert_eq!(statement.sql, format!("TRUNCATE TABLE {}", quote_ident(&name)));
            prop_assert!(statement.params.is_empty());
        }

        #[test]
        fn prop_hostile_identifiers_never_compile(name in arb_hostile_identifier()) {
            prop_assert!(!is_valid_identifier(&name));

            let compiler = compiler();
            prop_assert!(compiler.drop_table(&name, true).is_err());
            prop_assert!(compiler.drop_database(&name, true).is_err());
            prop_assert!(compiler.drop_column("t", &name).is_err());
            prop_assert!(compiler.rename_table("t", &name).is_err());
        }

        #[test]
        fn prop_where_clause_follows_key_order(filter in arb_filter()) {
            let (clause, params) = compiler().where_clause(&filter).unwrap();

            let expected: Vec<String> = filter.keys().map(|k| format!("`{}` = ?", k)).collect();
            prop_assert_eq!(clause, expected.join(" AND "));
            prop_assert_eq!(params, filter.values().cloned().collect::<Vec<_>>());
        }

        #[test]
        fn prop_update_binds_values_before_filters(values in arb_filter(), filter in arb_filter()) {
            let statement = compiler().update("t", &values, &filter).unwrap();

            let expected: Vec<Value> = values.values().chain(filter.values()).cloned().collect();
            prop_assert_eq!(statement.params, expected);
            prop_assert_eq!(statement.sql.matches('?').count(), values.len() + filter.len());
        }

        #[test]
        fn prop_limit_never_exceeds_maximum(limit in 0i64..1_000_000) {
            let statement = compiler().select_page("t", limit, 0).unwrap();
            let expected = limit.min(1000);
            prop_assert_eq!(statement.sql, format!("SELECT * FROM `t` LIMIT {} OFFSET 0", expected));
        }
    }
}
