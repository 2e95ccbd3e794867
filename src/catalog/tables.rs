use super::{exec, Catalog};
use crate::core::db::{group_indexes, value_as_u64};
use crate::envelope::Envelope;
use serde_json::{json, Value};

impl Catalog {
    /// Drops a table. With `force` a missing table is not an error.
    pub async fn delete_table(&self, table_name: &str, force: bool) -> Envelope {
        let failure = format!("Failed to delete table '{}'", table_name);
        self.run("delete_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.drop_table(table_name, force)?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({ "table_name": table_name, "force": force, "database": database }),
                format!(
                    "Table '{}' deleted successfully from database '{}'",
                    table_name, database
                ),
            ))
        })
        .await
    }

    /// Counts the rows, then truncates the table.
    pub async fn truncate_table(&self, table_name: &str) -> Envelope {
        let failure = format!("Failed to truncate table '{}'", table_name);
        self.run("truncate_table", failure, async {
            let database = self.session.require_active()?;
            let count = self.compiler.count_rows(table_name)?;
            let truncate = self.compiler.truncate(table_name)?;
            let mut conn = self.connect_to(&database).await?;
            let rows_removed = exec(&mut conn, &count)
                .await?
                .scalar()
                .and_then(value_as_u64)
                .unwrap_or(0);
            exec(&mut conn, &truncate).await?;
            conn.release().await;

            Ok((
                json!({ "table_name": table_name, "rows_removed": rows_removed, "database": database }),
                format!(
                    "Table '{}' truncated successfully, removed {} rows from database '{}'",
                    table_name, rows_removed, database
                ),
            ))
        })
        .await
    }

    pub async fn add_column(
        &self,
        table_name: &str,
        column_name: &str,
        column_type: &str,
        constraints: &[String],
        default_value: Option<&Value>,
        after_column: Option<&str>,
    ) -> Envelope {
        let failure = format!(
            "Failed to add column '{}' to table '{}'",
            column_name, table_name
        );
        self.run("add_column", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.add_column(
                table_name,
                column_name,
                column_type,
                constraints,
                default_value,
                after_column,
            )?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({
                    "table_name": table_name,
                    "column_name": column_name,
                    "column_type": column_type,
                    "constraints": constraints,
                    "default_value": default_value,
                    "after_column": after_column,
                    "database": database,
                }),
                format!(
                    "Column '{}' added successfully to table '{}' in database '{}'",
                    column_name, table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn drop_column(&self, table_name: &str, column_name: &str) -> Envelope {
        let failure = format!(
            "Failed to drop column '{}' from table '{}'",
            column_name, table_name
        );
        self.run("drop_column", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.drop_column(table_name, column_name)?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({ "table_name": table_name, "column_name": column_name, "database": database }),
                format!(
                    "Column '{}' dropped successfully from table '{}' in database '{}'",
                    column_name, table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn modify_column(
        &self,
        table_name: &str,
        column_name: &str,
        new_type: &str,
        new_constraints: &[String],
        new_default: Option<&Value>,
    ) -> Envelope {
        let failure = format!(
            "Failed to modify column '{}' in table '{}'",
            column_name, table_name
        );
        self.run("modify_column", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.modify_column(
                table_name,
                column_name,
                new_type,
                new_constraints,
                new_default,
            )?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({
                    "table_name": table_name,
                    "column_name": column_name,
                    "new_type": new_type,
                    "new_constraints": new_constraints,
                    "new_default": new_default,
                    "database": database,
                }),
                format!(
                    "Column '{}' modified successfully in table '{}' in database '{}'",
                    column_name, table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn rename_table(&self, old_table_name: &str, new_table_name: &str) -> Envelope {
        let failure = format!(
            "Failed to rename table '{}' to '{}'",
            old_table_name, new_table_name
        );
        self.run("rename_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.rename_table(old_table_name, new_table_name)?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({
                    "old_table_name": old_table_name,
                    "new_table_name": new_table_name,
                    "database": database,
                }),
                format!(
                    "Table '{}' renamed successfully to '{}' in database '{}'",
                    old_table_name, new_table_name, database
                ),
            ))
        })
        .await
    }

    /// Lists indexes grouped by name, in the order `SHOW INDEX` first reports them.
    pub async fn get_table_indexes(&self, table_name: &str) -> Envelope {
        let failure = format!("Failed to get indexes for table '{}'", table_name);
        self.run("get_table_indexes", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.show_index(table_name)?;
            let mut conn = self.connect_to(&database).await?;
            let result = exec(&mut conn, &statement).await?;
            conn.release().await;

            let indexes = group_indexes(&result);
            let message = format!(
                "Retrieved {} indexes for table '{}' in database '{}'",
                indexes.len(),
                table_name,
                database
            );
            Ok((
                json!({
                    "table_name": table_name,
                    "index_count": indexes.len(),
                    "indexes": indexes,
                    "database": database,
                }),
                message,
            ))
        })
        .await
    }

    pub async fn create_index(
        &self,
        table_name: &str,
        index_name: &str,
        columns: &[String],
        index_type: &str,
        unique: bool,
    ) -> Envelope {
        let failure = format!(
            "Failed to create index '{}' on table '{}'",
            index_name, table_name
        );
        self.run("create_index", failure, async {
            let database = self.session.require_active()?;
            let statement = self
                .compiler
                .create_index(table_name, index_name, columns, index_type, unique)?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({
                    "table_name": table_name,
                    "index_name": index_name,
                    "columns": columns,
                    "index_type": index_type,
                    "unique": unique,
                    "database": database,
                }),
                format!(
                    "Index '{}' created successfully on table '{}' in database '{}'",
                    index_name, table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn drop_index(&self, table_name: &str, index_name: &str) -> Envelope {
        let failure = format!(
            "Failed to drop index '{}' from table '{}'",
            index_name, table_name
        );
        self.run("drop_index", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.drop_index(table_name, index_name)?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({ "table_name": table_name, "index_name": index_name, "database": database }),
                format!(
                    "Index '{}' dropped successfully from table '{}' in database '{}'",
                    index_name, table_name, database
                ),
            ))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::tests::catalog_on;
    use crate::test_utils::{rows, ScriptedEngine};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_truncate_reports_removed_rows() {
        let engine = ScriptedEngine::new();
        engine.respond("SELECT COUNT(*)", rows(&["COUNT(*)"], vec![vec![json!(12)]]));
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.truncate_table("orders").await;
        assert!(envelope.is_success());
        assert_eq!(envelope.data()["rows_removed"], 12);
        assert_eq!(
            engine.sql_log(),
            vec!["SELECT COUNT(*) FROM `orders`", "TRUNCATE TABLE `orders`"]
        );
    }

    #[tokio::test]
    async fn test_delete_table_force_uses_if_exists() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");

        catalog.delete_table("orders", true).await;
        catalog.delete_table("orders", false).await;
        assert_eq!(
            engine.sql_log(),
            vec!["DROP TABLE IF EXISTS `orders`", "DROP TABLE `orders`"]
        );
    }

    #[tokio::test]
    async fn test_get_table_indexes_groups_rows() {
        let engine = ScriptedEngine::new();
        let row = |non_unique: i64, key: &str, seq: i64, column: &str| {
            vec![
                json!("orders"),
                json!(non_unique),
                json!(key),
                json!(seq),
                json!(column),
                json!("A"),
                json!(0),
                Value::Null,
                Value::Null,
                json!(""),
                json!("BTREE"),
            ]
        };
        engine.respond(
            "SHOW INDEX",
            rows(
                &[],
                vec![
                    row(0, "PRIMARY", 1, "id"),
                    row(1, "idx_customer", 1, "customer_id"),
                    row(1, "idx_customer", 2, "created_at"),
                ],
            ),
        );
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.get_table_indexes("orders").await;
        assert_eq!(envelope.data()["index_count"], 2);
        assert_eq!(envelope.data()["indexes"][0]["type"], "UNIQUE");
        assert_eq!(envelope.data()["indexes"][1]["type"], "NONUNIQUE");
        assert_eq!(envelope.data()["indexes"][1]["columns"][1]["column_name"], "created_at");
    }

    #[tokio::test]
    async fn test_create_index_rejects_bad_column() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog
            .create_index("orders", "idx", &["ok".into(), "bad col".into()], "BTREE", false)
            .await;
        assert_eq!(envelope.kind, Some("ValidationError"));
        assert!(engine.connects().is_empty());

        let envelope = catalog
            .create_index("orders", "uniq_ref", &["reference".into()], "btree", true)
            .await;
        assert!(envelope.is_success());
        assert_eq!(
            engine.sql_log(),
            vec!["CREATE UNIQUE INDEX `uniq_ref` ON `orders` (`reference`) USING BTREE"]
        );
    }

    #[tokio::test]
    async fn test_execution_error_keeps_cause() {
        let engine = ScriptedEngine::new();
        engine.fail("DROP COLUMN", "Can't DROP 'note'; check that column/key exists");
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.drop_column("orders", "note").await;
        assert_eq!(envelope.message, "Failed to drop column 'note' from table 'orders'");
        assert!(envelope.error.unwrap().contains("check that column/key exists"));
        assert_eq!(engine.closes(), 1);
    }
}
