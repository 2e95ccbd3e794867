use super::{exec, Catalog};
use crate::core::db::{describe_columns, value_as_u64, Scope, TableStats, TABLE_SIZE_SQL};
use crate::core::AdminError;
use crate::envelope::Envelope;
use crate::sql::{ColumnDef, TableOptions};
use crate::validation::{check_create_table_sql, created_table_name};
use serde_json::{json, Map, Value};

impl Catalog {
    /// Checks connectivity and reports the server version, bound database and connection id.
    ///
    /// Binds to the active database when there is one, otherwise connects at server level.
    pub async fn test_connection(&self) -> Envelope {
        self.run("test_connection", "Database connection failed", async {
            let scope = match self.session.active() {
                Some(database) => Scope::Database(database),
                None => Scope::Server,
            };
            let mut conn = self.connections.acquire(scope).await?;
            let result = conn
                .execute("SELECT VERSION(), DATABASE(), CONNECTION_ID()", &[])
                .await?;
            conn.release().await;

            let row: &[Value] = result.first_row().unwrap_or_default();
            let cell = |i: usize| row.get(i).cloned().unwrap_or(Value::Null);
            Ok((
                json!({
                    "server_version": cell(0),
                    "database": cell(1),
                    "connection_id": cell(2),
                }),
                "Database connection successful".to_string(),
            ))
        })
        .await
    }

    pub async fn list_tables(&self) -> Envelope {
        self.run("list_tables", "Failed to list tables", async {
            let database = self.session.require_active()?;
            let mut conn = self.connect_to(&database).await?;
            let tables = conn.execute("SHOW TABLES", &[]).await?.column_strings(0);
            conn.release().await;

            let message = format!("Found {} tables in database '{}'", tables.len(), database);
            Ok((json!({ "tables": tables }), message))
        })
        .await
    }

    pub async fn get_table_schema(&self, table_name: &str) -> Envelope {
        let failure = format!("Failed to get schema for table '{}'", table_name);
        self.run("get_table_schema", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.describe(table_name)?;
            let mut conn = self.connect_to(&database).await?;
            let result = exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({ "schema": describe_columns(&result) }),
                format!(
                    "Schema retrieved for table '{}' in database '{}'",
                    table_name, database
                ),
            ))
        })
        .await
    }

    /// Reads one page of rows. The limit is clamped to `security.max_results`.
    pub async fn read_table(&self, table_name: &str, limit: i64, offset: i64) -> Envelope {
        let failure = format!("Failed to read from table '{}'", table_name);
        self.run("read_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.select_page(table_name, limit, offset)?;
            let mut conn = self.connect_to(&database).await?;
            let result = exec(&mut conn, &statement).await?;
            conn.release().await;

            let count = result.row_count();
            Ok((
                json!({
                    "data": result.to_objects(),
                    "count": count,
                    "table": table_name,
                    "database": database,
                }),
                format!(
                    "Retrieved {} rows from table '{}' in database '{}'",
                    count, table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn write_table(&self, table_name: &str, data: &Map<String, Value>) -> Envelope {
        let failure = format!("Failed to write to table '{}'", table_name);
        self.run("write_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.insert(table_name, data)?;
            let mut conn = self.connect_to(&database).await?;
            let result = exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({
                    "inserted_id": result.last_insert_id,
                    "affected_rows": result.rows_affected,
                    "database": database,
                }),
                format!(
                    "Data inserted successfully into table '{}' in database '{}'",
                    table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn update_table(
        &self,
        table_name: &str,
        data: &Map<String, Value>,
        where_conditions: &Map<String, Value>,
    ) -> Envelope {
        let failure = format!("Failed to update table '{}'", table_name);
        self.run("update_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.update(table_name, data, where_conditions)?;
            let mut conn = self.connect_to(&database).await?;
            let affected = exec(&mut conn, &statement).await?.rows_affected;
            conn.release().await;

            Ok((
                json!({ "affected_rows": affected, "database": database }),
                format!(
                    "Updated {} rows in table '{}' in database '{}'",
                    affected, table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn delete_from_table(
        &self,
        table_name: &str,
        where_conditions: &Map<String, Value>,
    ) -> Envelope {
        let failure = format!("Failed to delete from table '{}'", table_name);
        self.run("delete_from_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.delete(table_name, where_conditions)?;
            let mut conn = self.connect_to(&database).await?;
            let affected = exec(&mut conn, &statement).await?.rows_affected;
            conn.release().await;

            Ok((
                json!({ "affected_rows": affected, "database": database }),
                format!(
                    "Deleted {} rows from table '{}' in database '{}'",
                    affected, table_name, database
                ),
            ))
        })
        .await
    }

    /// Runs one ad-hoc statement whose kind is in `security.allowed_operations`.
    pub async fn execute_sql(&self, query: &str) -> Envelope {
        self.run("execute_sql", "Failed to execute SQL query", async {
            let database = self.session.require_active()?;
            self.compiler.validator().check_adhoc_query(query)?;
            let mut conn = self.connect_to(&database).await?;
            let result = conn.execute(query.trim(), &[]).await?;
            conn.release().await;

            let count = result.row_count();
            Ok((
                json!({
                    "data": result.to_objects(),
                    "count": count,
                    "affected_rows": result.rows_affected,
                    "database": database,
                }),
                format!(
                    "Query executed successfully, returned {} rows from database '{}'",
                    count, database
                ),
            ))
        })
        .await
    }

    pub async fn create_table(
        &self,
        table_name: &str,
        columns: &[ColumnDef],
        options: Option<&TableOptions>,
    ) -> Envelope {
        let failure = format!("Failed to create table '{}'", table_name);
        self.run("create_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self.compiler.create_table(table_name, columns, options)?;
            let mut conn = self.connect_to(&database).await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            Ok((
                json!({
                    "table_name": table_name,
                    "columns": columns.len(),
                    "sql": statement.sql,
                    "database": database,
                }),
                format!(
                    "Table '{}' created successfully in database '{}'",
                    table_name, database
                ),
            ))
        })
        .await
    }

    /// Runs a caller-written CREATE TABLE that passes the prefix and keyword checks.
    pub async fn create_table_from_sql(&self, create_table_sql: &str) -> Envelope {
        self.run("create_table_from_sql", "Failed to create table from SQL", async {
            let database = self.session.require_active()?;
            check_create_table_sql(create_table_sql)?;
            if create_table_sql.len() > self.security.max_query_length {
                return Err(AdminError::validation(format!(
                    "Statement is {} characters long, the limit is {}",
                    create_table_sql.len(),
                    self.security.max_query_length
                )));
            }
            let sql = create_table_sql.trim();
            let table_name = created_table_name(sql);

            let mut conn = self.connect_to(&database).await?;
            conn.execute(sql, &[]).await?;
            conn.release().await;

            let message = format!(
                "Table '{}' created successfully in database '{}'",
                table_name, database
            );
            Ok((
                json!({ "table_name": table_name, "sql": sql, "database": database }),
                message,
            ))
        })
        .await
    }

    /// Exact row count plus information_schema size estimates.
    pub async fn get_table_stats(&self, table_name: &str) -> Envelope {
        let failure = format!("Failed to get stats for table '{}'", table_name);
        self.run("get_table_stats", failure, async {
            let database = self.session.require_active()?;
            let count = self.compiler.count_rows(table_name)?;
            let mut conn = self.connect_to(&database).await?;
            let row_count = exec(&mut conn, &count)
                .await?
                .scalar()
                .and_then(value_as_u64)
                .unwrap_or(0);
            let sizes = conn
                .execute(TABLE_SIZE_SQL, &[Value::String(table_name.to_string())])
                .await?;
            conn.release().await;

            let mut stats = match TableStats::from_size_row(row_count, &sizes) {
                Some(stats) => serde_json::to_value(stats)?,
                None => json!({ "row_count": row_count }),
            };
            if let Value::Object(map) = &mut stats {
                map.insert("database".to_string(), Value::String(database.clone()));
            }
            Ok((
                stats,
                format!(
                    "Statistics retrieved for table '{}' in database '{}'",
                    table_name, database
                ),
            ))
        })
        .await
    }

    pub async fn search_table(
        &self,
        table_name: &str,
        search_column: &str,
        search_value: &str,
        limit: i64,
    ) -> Envelope {
        let failure = format!("Failed to search table '{}'", table_name);
        self.run("search_table", failure, async {
            let database = self.session.require_active()?;
            let statement = self
                .compiler
                .search(table_name, search_column, search_value, limit)?;
            let mut conn = self.connect_to(&database).await?;
            let result = exec(&mut conn, &statement).await?;
            conn.release().await;

            let count = result.row_count();
            Ok((
                json!({
                    "data": result.to_objects(),
                    "count": count,
                    "search_column": search_column,
                    "search_value": search_value,
                    "database": database,
                }),
                format!(
                    "Found {} matching rows in table '{}' in database '{}'",
                    count, table_name, database
                ),
            ))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::tests::{catalog_on, catalog_with};
    use crate::config::Config;
    use crate::test_utils::{rows, ScriptedEngine};
    use serde_json::{json, Map, Value};

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_read_table_clamps_and_binds_to_active_database() {
        let engine = ScriptedEngine::new();
        engine.respond(
            "SELECT * FROM `orders`",
            rows(&["id", "status"], vec![vec![json!(1), json!("new")]]),
        );
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.read_table("orders", 5000, 0).await;
        assert!(envelope.is_success());
        assert_eq!(envelope.data()["count"], 1);
        assert_eq!(envelope.data()["data"][0]["status"], "new");
        assert_eq!(envelope.message, "Retrieved 1 rows from table 'orders' in database 'shop'");

        assert_eq!(engine.sql_log(), vec!["SELECT * FROM `orders` LIMIT 1000 OFFSET 0"]);
        assert_eq!(engine.connects()[0].database.as_deref(), Some("shop"));
    }

    #[tokio::test]
    async fn test_invalid_table_name_never_connects() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.read_table("orders; DROP TABLE users", 10, 0).await;
        assert_eq!(envelope.kind, Some("ValidationError"));
        let envelope = catalog.read_table("orders", -1, 0).await;
        assert_eq!(envelope.kind, Some("ValidationError"));
        assert!(engine.connects().is_empty());
    }

    #[tokio::test]
    async fn test_update_binds_set_then_where() {
        let engine = ScriptedEngine::new();
        engine.respond("UPDATE", crate::core::db::QueryResult::affected(2, None));
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog
            .update_table(
                "orders",
                &map(json!({"status": "shipped"})),
                &map(json!({"status": "active", "region": "west"})),
            )
            .await;
        assert!(envelope.is_success());
        assert_eq!(envelope.data()["affected_rows"], 2);

        let statements = engine.statements();
        assert_eq!(
            statements[0].sql,
            "UPDATE `orders` SET `status` = ? WHERE `status` = ? AND `region` = ?"
        );
        assert_eq!(statements[0].params, vec![json!("shipped"), json!("active"), json!("west")]);
    }

    #[tokio::test]
    async fn test_write_table_reports_insert_id() {
        let engine = ScriptedEngine::new();
        engine.respond("INSERT INTO", crate::core::db::QueryResult::affected(1, Some(42)));
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog
            .write_table("orders", &map(json!({"customer": "acme"})))
            .await;
        assert_eq!(envelope.data()["inserted_id"], 42);
        assert_eq!(envelope.data()["affected_rows"], 1);
        assert_eq!(envelope.data()["database"], "shop");
    }

    #[tokio::test]
    async fn test_execute_sql_enforces_allow_list() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.execute_sql("DELETE FROM orders").await;
        assert_eq!(envelope.kind, Some("ValidationError"));
        assert!(engine.connects().is_empty());

        let envelope = catalog.execute_sql("   ").await;
        assert_eq!(envelope.kind, Some("ValidationError"));

        let mut config = Config::default();
        config.security.allowed_operations = vec!["*".to_string()];
        let catalog = catalog_with(&engine, config);
        catalog.session.set_active("shop");
        let envelope = catalog.execute_sql("DELETE FROM orders").await;
        assert!(envelope.is_success());
        assert_eq!(engine.sql_log(), vec!["DELETE FROM orders"]);
    }

    #[tokio::test]
    async fn test_execute_sql_never_sends_stacked_statements() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");

        for query in [
            "SELECT 1; DELETE FROM orders ORDER BY id LIMIT 1",
            "SELECT 1 # note\n; DROP TABLE orders",
        ] {
            let envelope = catalog.execute_sql(query).await;
            assert_eq!(envelope.kind, Some("ValidationError"), "{}", query);
        }
        assert!(engine.connects().is_empty());
    }

    #[tokio::test]
    async fn test_create_table_from_sql_denylist() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog
            .create_table_from_sql("CREATE TABLE t (id INT); DROP TABLE users")
            .await;
        assert_eq!(envelope.kind, Some("ValidationError"));
        assert!(engine.connects().is_empty());

        let envelope = catalog
            .create_table_from_sql("CREATE TABLE IF NOT EXISTS `Items` (id INT)")
            .await;
        assert!(envelope.is_success());
        assert_eq!(envelope.data()["table_name"], "items");
    }

    #[tokio::test]
    async fn test_create_table_reports_sql() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");
        let columns: Vec<crate::sql::ColumnDef> = serde_json::from_value(json!([
            {"name": "id", "type": "INT", "constraints": ["PRIMARY KEY", "AUTO_INCREMENT"]},
            {"name": "status", "type": "VARCHAR(20)", "default": "new"}
        ]))
        .unwrap();

        let envelope = catalog.create_table("orders", &columns, None).await;
        assert!(envelope.is_success());
        assert_eq!(envelope.data()["columns"], 2);
        assert_eq!(
            envelope.data()["sql"],
            "CREATE TABLE `orders` (\n  `id` INT PRIMARY KEY AUTO_INCREMENT,\n  `status` VARCHAR(20) DEFAULT 'new'\n)"
        );
    }

    #[tokio::test]
    async fn test_table_stats_with_and_without_size_row() {
        let engine = ScriptedEngine::new();
        engine.respond("SELECT COUNT(*)", rows(&["COUNT(*)"], vec![vec![json!(3)]]));
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.get_table_stats("orders").await;
        assert_eq!(envelope.data(), &json!({"row_count": 3, "database": "shop"}));

        engine.respond(
            "information_schema.tables",
            rows(
                &["table_name", "table_rows", "data_length", "index_length", "total_size"],
                vec![vec![json!("orders"), json!(2), json!(16384), json!(0), json!(16384)]],
            ),
        );
        let envelope = catalog.get_table_stats("orders").await;
        assert_eq!(envelope.data()["actual_rows"], 3);
        assert_eq!(envelope.data()["estimated_rows"], 2);
        assert_eq!(envelope.data()["database"], "shop");
        assert_eq!(engine.statements()[1].params, vec![json!("orders")]);
    }

    #[tokio::test]
    async fn test_search_table_binds_pattern() {
        let engine = ScriptedEngine::new();
        let catalog = catalog_on(&engine, "shop");

        let envelope = catalog.search_table("users", "email", "acme", 50).await;
        assert!(envelope.is_success());
        assert_eq!(envelope.data()["search_value"], "acme");
        assert_eq!(engine.statements()[0].params, vec![json!("%acme%")]);
    }

    #[tokio::test]
    async fn test_test_connection_without_session_is_unscoped() {
        let engine = ScriptedEngine::new();
        engine.respond(
            "SELECT VERSION()",
            rows(&["v", "d", "c"], vec![vec![json!("8.0.36"), Value::Null, json!(11)]]),
        );
        let catalog = crate::catalog::tests::catalog(&engine);

        let envelope = catalog.test_connection().await;
        assert!(envelope.is_success());
        assert_eq!(envelope.data()["server_version"], "8.0.36");
        assert_eq!(engine.connects()[0].database, None);

        engine.set_unreachable();
        let envelope = catalog.test_connection().await;
        assert_eq!(envelope.kind, Some("ConnectionError"));
        assert_eq!(envelope.message, "Database connection failed");
    }
}
