/// Tool Registry Module
///
/// The catalog's operations as named tools with JSON-Schema parameter
/// declarations, dispatched from JSON arguments.

use crate::catalog::Catalog;
use crate::core::AdminError;
use crate::envelope::Envelope;
use crate::sql::{ColumnDef, TableOptions};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info};

/// A tool as advertised to the host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

fn schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn table_name() -> Value {
    string("Name of the table")
}

fn object(description: &str) -> Value {
    json!({ "type": "object", "description": description })
}

fn string_list(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

fn integer(description: &str, default: i64) -> Value {
    json!({ "type": "integer", "description": description, "default": default })
}

fn boolean(description: &str, default: bool) -> Value {
    json!({ "type": "boolean", "description": description, "default": default })
}

fn tool(name: &'static str, description: &'static str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name,
        description,
        input_schema,
    }
}

fn definitions() -> Vec<ToolDefinition> {
    let none = || schema(json!({}), &[]);

    vec![
        tool("test_connection", "Tests the database connection and returns server information", none()),
        tool("list_tables", "Lists all tables in the current database", none()),
        tool(
            "get_table_schema",
            "Returns the column definitions of a table",
            schema(json!({ "table_name": table_name() }), &["table_name"]),
        ),
        tool(
            "read_table",
            "Reads rows from a table with pagination",
            schema(
                json!({
                    "table_name": table_name(),
                    "limit": integer("Maximum number of rows (capped by max_results)", 100),
                    "offset": integer("Number of rows to skip", 0),
                }),
                &["table_name"],
            ),
        ),
        tool(
            "write_table",
            "Inserts one row into a table",
            schema(
                json!({ "table_name": table_name(), "data": object("Column names mapped to values") }),
                &["table_name", "data"],
            ),
        ),
        tool(
            "update_table",
            "Updates rows matching all equality conditions",
            schema(
                json!({
                    "table_name": table_name(),
                    "data": object("Column names mapped to new values"),
                    "where_conditions": object("Column names mapped to values that must match"),
                }),
                &["table_name", "data", "where_conditions"],
            ),
        ),
        tool(
            "delete_from_table",
            "Deletes rows matching all equality conditions",
            schema(
                json!({
                    "table_name": table_name(),
                    "where_conditions": object("Column names mapped to values that must match"),
                }),
                &["table_name", "where_conditions"],
            ),
        ),
        tool(
            "execute_sql",
            "Executes one SQL statement of an allowed kind",
            schema(json!({ "query": string("SQL statement") }), &["query"]),
        ),
        tool(
            "create_table",
            "Creates a table from column definitions",
            schema(
                json!({
                    "table_name": table_name(),
                    "columns": {
                        "type": "array",
                        "description": "Column definitions",
                        "items": {
                            "type": "object",
                            "properties": {
                                "name": { "type": "string" },
                                "type": { "type": "string" },
                                "constraints": { "type": "array", "items": { "type": "string" } },
                                "default": {}
                            },
                            "required": ["name", "type"]
                        }
                    },
                    "options": {
                        "type": "object",
                        "description": "Table options",
                        "properties": {
                            "engine": { "type": "string" },
                            "charset": { "type": "string" },
                            "collation": { "type": "string" }
                        }
                    },
                }),
                &["table_name", "columns"],
            ),
        ),
        tool(
            "create_table_from_sql",
            "Creates a table from a CREATE TABLE statement",
            schema(
                json!({ "create_table_sql": string("CREATE TABLE statement") }),
                &["create_table_sql"],
            ),
        ),
        tool(
            "get_table_stats",
            "Returns row count and storage size of a table",
            schema(json!({ "table_name": table_name() }), &["table_name"]),
        ),
        tool(
            "search_table",
            "Finds rows whose column contains a value",
            schema(
                json!({
                    "table_name": table_name(),
                    "search_column": string("Column to search"),
                    "search_value": string("Substring to look for"),
                    "limit": integer("Maximum number of rows (capped by max_results)", 50),
                }),
                &["table_name", "search_column", "search_value"],
            ),
        ),
        tool("get_database_info", "Returns name, table count and size of the current database", none()),
        tool("list_databases", "Lists all databases on the server", none()),
        tool(
            "create_database",
            "Creates a database",
            schema(
                json!({
                    "database_name": string("Name of the database"),
                    "charset": string("Character set (defaults to the configured one)"),
                    "collation": string("Collation (defaults to the configured one)"),
                }),
                &["database_name"],
            ),
        ),
        tool(
            "delete_database",
            "Deletes a database, backing it up first unless forced",
            schema(
                json!({
                    "database_name": string("Name of the database"),
                    "force": boolean("Drop with IF EXISTS and skip the backup", false),
                }),
                &["database_name"],
            ),
        ),
        tool(
            "switch_database",
            "Selects the database used by table operations",
            schema(json!({ "database_name": string("Name of the database") }), &["database_name"]),
        ),
        tool("get_current_database", "Returns the currently selected database", none()),
        tool(
            "get_database_details",
            "Returns tables, table count and size of a database",
            schema(
                json!({ "database_name": string("Name of the database (defaults to the current one)") }),
                &[],
            ),
        ),
        tool(
            "copy_database",
            "Copies every table of a database, structure and rows",
            schema(
                json!({
                    "source_database": string("Database to copy from"),
                    "target_database": string("Database to copy into"),
                }),
                &["source_database", "target_database"],
            ),
        ),
        tool(
            "rename_database",
            "Renames a database by copying it and dropping the original",
            schema(
                json!({ "old_name": string("Current name"), "new_name": string("New name") }),
                &["old_name", "new_name"],
            ),
        ),
        tool(
            "delete_table",
            "Drops a table",
            schema(
                json!({ "table_name": table_name(), "force": boolean("Drop with IF EXISTS", false) }),
                &["table_name"],
            ),
        ),
        tool(
            "truncate_table",
            "Removes all rows from a table",
            schema(json!({ "table_name": table_name() }), &["table_name"]),
        ),
        tool(
            "add_column",
            "Adds a column to a table",
            schema(
                json!({
                    "table_name": table_name(),
                    "column_name": string("Name of the new column"),
                    "column_type": string("Column type, e.g. VARCHAR(100)"),
                    "constraints": string_list("Constraints such as NOT NULL"),
                    "default_value": { "description": "Default value" },
                    "after_column": string("Place the column after this one"),
                }),
                &["table_name", "column_name", "column_type"],
            ),
        ),
        tool(
            "drop_column",
            "Removes a column from a table",
            schema(
                json!({ "table_name": table_name(), "column_name": string("Column to remove") }),
                &["table_name", "column_name"],
            ),
        ),
        tool(
            "modify_column",
            "Changes the type, constraints or default of a column",
            schema(
                json!({
                    "table_name": table_name(),
                    "column_name": string("Column to change"),
                    "new_type": string("New column type"),
                    "new_constraints": string_list("New constraints"),
                    "new_default": { "description": "New default value" },
                }),
                &["table_name", "column_name", "new_type"],
            ),
        ),
        tool(
            "rename_table",
            "Renames a table",
            schema(
                json!({
                    "old_table_name": string("Current table name"),
                    "new_table_name": string("New table name"),
                }),
                &["old_table_name", "new_table_name"],
            ),
        ),
        tool(
            "get_table_indexes",
            "Lists the indexes of a table",
            schema(json!({ "table_name": table_name() }), &["table_name"]),
        ),
        tool(
            "create_index",
            "Creates an index on a table",
            schema(
                json!({
                    "table_name": table_name(),
                    "index_name": string("Name of the index"),
                    "columns": string_list("Indexed columns in order"),
                    "index_type": { "type": "string", "description": "Index method", "default": "BTREE" },
                    "unique": boolean("Create a UNIQUE index", false),
                }),
                &["table_name", "index_name", "columns"],
            ),
        ),
        tool(
            "drop_index",
            "Removes an index from a table",
            schema(
                json!({ "table_name": table_name(), "index_name": string("Index to remove") }),
                &["table_name", "index_name"],
            ),
        ),
    ]
}

fn default_read_limit() -> i64 {
    100
}

fn default_search_limit() -> i64 {
    50
}

fn default_index_type() -> String {
    "BTREE".to_string()
}

#[derive(Deserialize)]
struct TableArgs {
    table_name: String,
}

#[derive(Deserialize)]
struct ReadArgs {
    table_name: String,
    #[serde(default = "default_read_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

#[derive(Deserialize)]
struct WriteArgs {
    table_name: String,
    data: Map<String, Value>,
}

#[derive(Deserialize)]
struct UpdateArgs {
    table_name: String,
    data: Map<String, Value>,
    where_conditions: Map<String, Value>,
}

#[derive(Deserialize)]
struct DeleteRowsArgs {
    table_name: String,
    where_conditions: Map<String, Value>,
}

#[derive(Deserialize)]
struct QueryArgs {
    query: String,
}

#[derive(Deserialize)]
struct CreateTableArgs {
    table_name: String,
    columns: Vec<ColumnDef>,
    #[serde(default)]
    options: Option<TableOptions>,
}

#[derive(Deserialize)]
struct CreateTableSqlArgs {
    create_table_sql: String,
}

#[derive(Deserialize)]
struct SearchArgs {
    table_name: String,
    search_column: String,
    search_value: String,
    #[serde(default = "default_search_limit")]
    limit: i64,
}

#[derive(Deserialize)]
struct CreateDatabaseArgs {
    database_name: String,
    #[serde(default)]
    charset: Option<String>,
    #[serde(default)]
    collation: Option<String>,
}

#[derive(Deserialize)]
struct DatabaseArgs {
    database_name: String,
}

#[derive(Deserialize)]
struct OptionalDatabaseArgs {
    #[serde(default)]
    database_name: Option<String>,
}

#[derive(Deserialize)]
struct ForcedArgs<T> {
    #[serde(flatten)]
    target: T,
    #[serde(default)]
    force: bool,
}

#[derive(Deserialize)]
struct CopyArgs {
    source_database: String,
    target_database: String,
}

#[derive(Deserialize)]
struct RenameDatabaseArgs {
    old_name: String,
    new_name: String,
}

#[derive(Deserialize)]
struct AddColumnArgs {
    table_name: String,
    column_name: String,
    column_type: String,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    default_value: Option<Value>,
    #[serde(default)]
    after_column: Option<String>,
}

#[derive(Deserialize)]
struct ColumnArgs {
    table_name: String,
    column_name: String,
}

#[derive(Deserialize)]
struct ModifyColumnArgs {
    table_name: String,
    column_name: String,
    new_type: String,
    #[serde(default)]
    new_constraints: Vec<String>,
    #[serde(default)]
    new_default: Option<Value>,
}

#[derive(Deserialize)]
struct RenameTableArgs {
    old_table_name: String,
    new_table_name: String,
}

#[derive(Deserialize)]
struct CreateIndexArgs {
    table_name: String,
    index_name: String,
    columns: Vec<String>,
    #[serde(default = "default_index_type")]
    index_type: String,
    #[serde(default)]
    unique: bool,
}

#[derive(Deserialize)]
struct IndexArgs {
    table_name: String,
    index_name: String,
}

/// Deserializes tool arguments; a missing or null argument object counts as `{}`.
fn parse<T: DeserializeOwned>(arguments: &Value) -> Result<T, AdminError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(arguments)
        .map_err(|e| AdminError::validation(format!("Invalid arguments: {}", e)))
}

/// Registry of every catalog operation.
pub struct ToolRegistry {
    catalog: Arc<Catalog>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        ToolRegistry {
            catalog,
            definitions: definitions(),
        }
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.iter().any(|tool| tool.name == name)
    }

    /// Invokes tool `name` with a JSON argument object. Never fails outward:
    /// unknown tools and malformed arguments come back as error envelopes.
    pub async fn call(&self, name: &str, arguments: &Value) -> Envelope {
        info!("[CLIENT CALL] {} called with arguments={}", name, arguments);

        match self.dispatch(name, arguments).await {
            Ok(envelope) => envelope,
            Err(err) => {
                error!("[CLIENT CALL] {} failed with error: {}", name, err);
                let message = if self.contains(name) {
                    format!("Invalid arguments for '{}'", name)
                } else {
                    format!("Unknown tool '{}'", name)
                };
                Envelope::failure(&err, message)
            }
        }
    }

    async fn dispatch(&self, name: &str, arguments: &Value) -> Result<Envelope, AdminError> {
        let catalog = &self.catalog;
        let envelope = match name {
            "test_connection" => catalog.test_connection().await,
            "list_tables" => catalog.list_tables().await,
            "get_table_schema" => {
                let args: TableArgs = parse(arguments)?;
                catalog.get_table_schema(&args.table_name).await
            }
            "read_table" => {
                let args: ReadArgs = parse(arguments)?;
                catalog.read_table(&args.table_name, args.limit, args.offset).await
            }
            "write_table" => {
                let args: WriteArgs = parse(arguments)?;
                catalog.write_table(&args.table_name, &args.data).await
            }
            "update_table" => {
                let args: UpdateArgs = parse(arguments)?;
                catalog
                    .update_table(&args.table_name, &args.data, &args.where_conditions)
                    .await
            }
            "delete_from_table" => {
                let args: DeleteRowsArgs = parse(arguments)?;
                catalog
                    .delete_from_table(&args.table_name, &args.where_conditions)
                    .await
            }
            "execute_sql" => {
                let args: QueryArgs = parse(arguments)?;
                catalog.execute_sql(&args.query).await
            }
            "create_table" => {
                let args: CreateTableArgs = parse(arguments)?;
                catalog
                    .create_table(&args.table_name, &args.columns, args.options.as_ref())
                    .await
            }
            "create_table_from_sql" => {
                let args: CreateTableSqlArgs = parse(arguments)?;
                catalog.create_table_from_sql(&args.create_table_sql).await
            }
            "get_table_stats" => {
                let args: TableArgs = parse(arguments)?;
                catalog.get_table_stats(&args.table_name).await
            }
            "search_table" => {
                let args: SearchArgs = parse(arguments)?;
                catalog
                    .search_table(&args.table_name, &args.search_column, &args.search_value, args.limit)
                    .await
            }
            "get_database_info" => catalog.get_database_info().await,
            "list_databases" => catalog.list_databases().await,
            "create_database" => {
                let args: CreateDatabaseArgs = parse(arguments)?;
                catalog
                    .create_database(
                        &args.database_name,
                        args.charset.as_deref(),
                        args.collation.as_deref(),
                    )
                    .await
            }
            "delete_database" => {
                let args: ForcedArgs<DatabaseArgs> = parse(arguments)?;
                catalog
                    .delete_database(&args.target.database_name, args.force)
                    .await
            }
            "switch_database" => {
                let args: DatabaseArgs = parse(arguments)?;
                catalog.switch_database(&args.database_name).await
            }
            "get_current_database" => catalog.get_current_database().await,
            "get_database_details" => {
                let args: OptionalDatabaseArgs = parse(arguments)?;
                catalog
                    .get_database_details(args.database_name.as_deref())
                    .await
            }
            "copy_database" => {
                let args: CopyArgs = parse(arguments)?;
                catalog
                    .copy_database(&args.source_database, &args.target_database)
                    .await
            }
            "rename_database" => {
                let args: RenameDatabaseArgs = parse(arguments)?;
                catalog.rename_database(&args.old_name, &args.new_name).await
            }
            "delete_table" => {
                let args: ForcedArgs<TableArgs> = parse(arguments)?;
                catalog.delete_table(&args.target.table_name, args.force).await
            }
            "truncate_table" => {
                let args: TableArgs = parse(arguments)?;
                catalog.truncate_table(&args.table_name).await
            }
            "add_column" => {
                let args: AddColumnArgs = parse(arguments)?;
                catalog
                    .add_column(
                        &args.table_name,
                        &args.column_name,
                        &args.column_type,
                        &args.constraints,
                        args.default_value.as_ref(),
                        args.after_column.as_deref(),
                    )
                    .await
            }
            "drop_column" => {
                let args: ColumnArgs = parse(arguments)?;
                catalog.drop_column(&args.table_name, &args.column_name).await
            }
            "modify_column" => {
                let args: ModifyColumnArgs = parse(arguments)?;
                catalog
                    .modify_column(
                        &args.table_name,
                        &args.column_name,
                        &args.new_type,
                        &args.new_constraints,
                        args.new_default.as_ref(),
                    )
                    .await
            }
            "rename_table" => {
                let args: RenameTableArgs = parse(arguments)?;
                catalog
                    .rename_table(&args.old_table_name, &args.new_table_name)
                    .await
            }
            "get_table_indexes" => {
                let args: TableArgs = parse(arguments)?;
                catalog.get_table_indexes(&args.table_name).await
            }
            "create_index" => {
                let args: CreateIndexArgs = parse(arguments)?;
                catalog
                    .create_index(
                        &args.table_name,
                        &args.index_name,
                        &args.columns,
                        &args.index_type,
                        args.unique,
                    )
                    .await
            }
            "drop_index" => {
                let args: IndexArgs = parse(arguments)?;
                catalog.drop_index(&args.table_name, &args.index_name).await
            }
            other => {
                return Err(AdminError::validation(format!("Unknown tool: {}", other)));
            }
        };
        Ok(envelope)
    }
}
