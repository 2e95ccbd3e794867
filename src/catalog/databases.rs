use super::{exec, finish, Catalog};
use crate::core::db::{value_to_string, DatabaseDetails, StorageSize, DATABASE_DETAILS_SQL, DATABASE_SIZE_SQL};
use crate::core::db::{Scope, ScopedConnection};
use crate::core::{AdminError, Result};
use crate::envelope::Envelope;
use crate::sql::strip_database_qualifier;
use serde_json::{json, Value};
use tracing::{info, warn};

const DATABASE_EXISTS_SQL: &str =
    "SELECT SCHEMA_NAME FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?";

impl Catalog {
    /// Name, table count and storage size of the active database.
    pub async fn get_database_info(&self) -> Envelope {
        self.run("get_database_info", "Failed to get database information", async {
            let database = self.session.require_active()?;
            let mut conn = self.connect_to(&database).await?;
            let name = conn
                .execute("SELECT DATABASE()", &[])
                .await?
                .scalar()
                .map(value_to_string)
                .unwrap_or_else(|| database.clone());
            let table_count = conn.execute("SHOW TABLES", &[]).await?.row_count();
            let size = StorageSize::from_database_size(&conn.execute(DATABASE_SIZE_SQL, &[]).await?);
            conn.release().await;

            let message = format!("Database information retrieved for '{}'", name);
            Ok((
                json!({
                    "database_name": name,
                    "table_count": table_count,
                    "total_size_bytes": size.total_size_bytes,
                    "data_size_bytes": size.data_size_bytes,
                    "index_size_bytes": size.index_size_bytes,
                }),
                message,
            ))
        })
        .await
    }

    pub async fn list_databases(&self) -> Envelope {
        self.run("list_databases", "Failed to list databases", async {
            let mut conn = self.connect_server().await?;
            let databases = conn.execute("SHOW DATABASES", &[]).await?.column_strings(0);
            conn.release().await;

            let message = format!("Found {} databases", databases.len());
            Ok((json!({ "databases": databases }), message))
        })
        .await
    }

    /// Creates a database with the given or configured charset and collation.
    ///
    /// With `management.auto_switch_on_create` the new database is then made
    /// active; a failed switch is reported in `auto_switched` and does not fail
    /// the create.
    pub async fn create_database(
        &self,
        database_name: &str,
        charset: Option<&str>,
        collation: Option<&str>,
    ) -> Envelope {
        let failure = format!("Failed to create database '{}'", database_name);
        self.run("create_database", failure, async {
            self.check_database_name(database_name)?;
            let charset = charset.unwrap_or(&self.management.default_charset);
            let collation = collation.unwrap_or(&self.management.default_collation);
            let statement = self
                .compiler
                .create_database(database_name, charset, collation)?;

            let mut conn = self.connect_server().await?;
            exec(&mut conn, &statement).await?;
            conn.release().await;

            let mut data = json!({
                "database_name": database_name,
                "charset": charset,
                "collation": collation,
            });
            if self.management.auto_switch_on_create {
                let switched = match self.switch(database_name).await {
                    Ok(_) => true,
                    Err(e) => {
                        warn!("Auto-switch to new database '{}' failed: {}", database_name, e);
                        false
                    }
                };
                data["auto_switched"] = Value::Bool(switched);
            }
            Ok((data, format!("Database '{}' created successfully", database_name)))
        })
        .await
    }

    /// Drops a database.
    ///
    /// Protected databases are refused unless `management.allow_system_db_operations`
    /// is set, whatever `force` says. Without `force` and with
    /// `management.backup_before_delete`, the database is first copied to
    /// `<name>_backup_<timestamp>`; a failed backup is logged and the drop
    /// goes ahead.
    pub async fn delete_database(&self, database_name: &str, force: bool) -> Envelope {
        let failure = format!("Failed to delete database '{}'", database_name);
        let outcome = self.delete_database_inner(database_name, force).await;
        finish("delete_database", outcome.map_err(|e| (e, failure)))
    }

    async fn delete_database_inner(&self, database_name: &str, force: bool) -> Result<(Value, String)> {
        self.check_deletable(database_name)?;

        let mut backup = None;
        if self.management.backup_before_delete && !force {
            let backup_name = format!(
                "{}_backup_{}",
                database_name,
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            );
            match self.copy_tables(database_name, &backup_name).await {
                Ok(_) => {
                    info!("Backup created: {}", backup_name);
                    backup = Some(backup_name);
                }
                Err(e) => warn!("Backup of database '{}' failed: {}", database_name, e),
            }
        }

        self.drop_database(database_name, force).await?;

        let mut data = json!({ "database_name": database_name, "force": force });
        if let Some(backup_name) = backup {
            data["backup_created"] = Value::Bool(true);
            data["backup_name"] = Value::String(backup_name);
        }
        Ok((data, format!("Database '{}' deleted successfully", database_name)))
    }

    /// Makes `database_name` the active database after a test connection to it succeeds.
    pub async fn switch_database(&self, database_name: &str) -> Envelope {
        let failure = format!("Failed to switch to database '{}'", database_name);
        self.run("switch_database", failure, async {
            let previous = self.switch(database_name).await?;
            Ok((
                json!({ "previous_database": previous, "current_database": database_name }),
                format!("Successfully switched to database '{}'", database_name),
            ))
        })
        .await
    }

    /// Reports the active database without touching the engine.
    pub async fn get_current_database(&self) -> Envelope {
        self.run("get_current_database", "Failed to get current database", async {
            let current = self.session.active();
            let message = match &current {
                Some(name) => format!("Current database is '{}'", name),
                None => "No database selected".to_string(),
            };
            Ok((json!({ "current_database": current }), message))
        })
        .await
    }

    /// Table list, table count and storage size of a named database, or of
    /// the active database when no name is given.
    pub async fn get_database_details(&self, database_name: Option<&str>) -> Envelope {
        let label = database_name.unwrap_or("current");
        let failure = format!("Failed to get database details for '{}'", label);
        self.run("get_database_details", failure, async {
            let database = match database_name {
                Some(name) => {
                    self.compiler.validator().identifier("database", name)?;
                    name.to_string()
                }
                None => self.session.require_active()?,
            };
            let mut conn = self.connect_to(&database).await?;
            let tables = conn.execute("SHOW TABLES", &[]).await?.column_strings(0);
            let details = conn
                .execute(DATABASE_DETAILS_SQL, &[Value::String(database.clone())])
                .await?;
            conn.release().await;

            let details = DatabaseDetails::from_details_row(&details).unwrap_or(DatabaseDetails {
                database_name: database.clone(),
                table_count: tables.len() as u64,
                size: StorageSize::default(),
            });
            let message = format!("Database details retrieved for '{}'", details.database_name);
            Ok((
                json!({
                    "database_name": details.database_name,
                    "table_count": details.table_count,
                    "total_size_bytes": details.size.total_size_bytes,
                    "data_size_bytes": details.size.data_size_bytes,
                    "index_size_bytes": details.size.index_size_bytes,
                    "tables": tables,
                }),
                message,
            ))
        })
        .await
    }

    /// Copies every table of `source_database`, structure and rows, into
    /// `target_database`, creating the target if needed.
    ///
    /// A failure part-way leaves the tables copied so far in place, unless
    /// `management.compensate_failed_copy` is set and the target was created
    /// by this call, in which case the target is dropped again.
    pub async fn copy_database(&self, source_database: &str, target_database: &str) -> Envelope {
        let failure = format!(
            "Failed to copy database '{}' to '{}'",
            source_database, target_database
        );
        self.run("copy_database", failure, async {
            let copied = self.copy_tables(source_database, target_database).await?;
            Ok((
                json!({
                    "source_database": source_database,
                    "target_database": target_database,
                    "table_count": copied.len(),
                    "copied_tables": copied,
                }),
                format!(
                    "Successfully copied database '{}' to '{}'",
                    source_database, target_database
                ),
            ))
        })
        .await
    }

    /// Copies `old_name` to `new_name`, then force-drops `old_name`.
    ///
    /// `old_name` must be deletable before anything is copied, so protected
    /// databases are refused up front. Nothing is undone on failure: if the
    /// drop fails both databases remain.
    pub async fn rename_database(&self, old_name: &str, new_name: &str) -> Envelope {
        let outcome = self.rename_steps(old_name, new_name).await;
        finish("rename_database", outcome)
    }

    async fn rename_steps(
        &self,
        old_name: &str,
        new_name: &str,
    ) -> std::result::Result<(Value, String), (AdminError, String)> {
        self.check_deletable(old_name).map_err(|e| {
            (
                e,
                format!("Failed to rename database '{}' to '{}'", old_name, new_name),
            )
        })?;
        self.copy_tables(old_name, new_name).await.map_err(|e| {
            (
                e,
                format!("Failed to copy database '{}' to '{}'", old_name, new_name),
            )
        })?;
        self.drop_database(old_name, true).await.map_err(|e| {
            (
                e,
                format!(
                    "Failed to delete database '{}' after copying it to '{}'; both databases remain",
                    old_name, new_name
                ),
            )
        })?;
        Ok((
            json!({ "old_name": old_name, "new_name": new_name }),
            format!("Successfully renamed database '{}' to '{}'", old_name, new_name),
        ))
    }

    fn is_protected(&self, database_name: &str) -> bool {
        let lowered = database_name.to_lowercase();
        self.security
            .protected_databases
            .iter()
            .any(|protected| protected.to_lowercase() == lowered)
    }

    /// Valid, and either unprotected or system operations are allowed.
    fn check_deletable(&self, database_name: &str) -> Result<()> {
        self.compiler.validator().identifier("database", database_name)?;
        if self.is_protected(database_name) && !self.management.allow_system_db_operations {
            return Err(AdminError::validation(format!(
                "Database '{}' is a system database and cannot be deleted",
                database_name
            )));
        }
        Ok(())
    }

    fn check_database_name(&self, database_name: &str) -> Result<()> {
        self.compiler.validator().identifier("database", database_name)?;
        let max = self.management.max_database_name_length;
        if database_name.chars().count() > max {
            return Err(AdminError::validation(format!(
                "Database name must be {} characters or less",
                max
            )));
        }
        Ok(())
    }

    /// Test-connects to `database_name` and commits it as active. Returns the previous value.
    async fn switch(&self, database_name: &str) -> Result<Option<String>> {
        self.compiler.validator().identifier("database", database_name)?;
        let _switching = self.session.begin_switch().await;

        let mut conn = self
            .connections
            .acquire(Scope::Database(database_name.to_string()))
            .await?;
        conn.execute("SELECT DATABASE()", &[]).await?;
        conn.release().await;

        let previous = self.session.set_active(database_name);
        info!(
            "Active database changed from {:?} to '{}'",
            previous, database_name
        );
        Ok(previous)
    }

    async fn drop_database(&self, database_name: &str, if_exists: bool) -> Result<()> {
        let statement = self.compiler.drop_database(database_name, if_exists)?;
        let mut conn = self.connect_server().await?;
        exec(&mut conn, &statement).await?;
        conn.release().await;
        Ok(())
    }

    async fn copy_tables(&self, source: &str, target: &str) -> Result<Vec<String>> {
        self.compiler.validator().identifier("database", source)?;
        self.check_database_name(target)?;
        if source == target {
            return Err(AdminError::validation(
                "Source and target database must be different",
            ));
        }

        let mut conn = self.connect_server().await?;
        let compensate = self.management.compensate_failed_copy
            && conn
                .execute(DATABASE_EXISTS_SQL, &[Value::String(target.to_string())])
                .await?
                .rows
                .is_empty();

        let outcome = self.copy_steps(&mut conn, source, target).await;
        if let Err(e) = &outcome {
            if compensate {
                warn!("Copy to '{}' failed ({}), dropping the partial target", target, e);
                let cleanup = match self.compiler.drop_database(target, true) {
                    Ok(statement) => exec(&mut conn, &statement).await.map(|_| ()),
                    Err(e) => Err(e),
                };
                if let Err(cleanup_err) = cleanup {
                    warn!("Could not drop partial target '{}': {}", target, cleanup_err);
                }
            }
        }
        conn.release().await;
        outcome
    }

    async fn copy_steps(&self, conn: &mut ScopedConnection, source: &str, target: &str) -> Result<Vec<String>> {
        exec(conn, &self.compiler.ensure_database(target)?).await?;
        let tables = exec(conn, &self.compiler.show_tables_from(source)?)
            .await?
            .column_strings(0);
        exec(conn, &self.compiler.use_database(target)?).await?;

        let mut copied = Vec::with_capacity(tables.len());
        for table in tables {
            let definition = exec(conn, &self.compiler.show_create_table(source, &table)?).await?;
            let definition = definition
                .first_row()
                .and_then(|row| row.get(1))
                .map(value_to_string)
                .ok_or_else(|| {
                    AdminError::Execution(format!("No definition returned for table '{}'", table))
                })?;
            conn.execute(&strip_database_qualifier(&definition, source), &[])
                .await?;
            exec(conn, &self.compiler.copy_rows(source, target, &table)?).await?;
            copied.push(table);
        }
        Ok(copied)
    }
}
