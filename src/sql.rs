/// Statement Compiler Module
///
/// Builds every statement the operation catalog issues.
///
/// Turns structured operation arguments into SQL text plus a positional
/// parameter list. Values go into the parameter list wherever MySQL accepts
/// a placeholder; identifiers are validated and then interpolated in
/// backticks. DDL takes no placeholders, so DDL statements always come back
/// with an empty parameter list.

use crate::core::{AdminError, Result};
use crate::validation::Validator;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A compiled statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: impl Into<String>) -> Self {
        Statement {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Statement {
            sql: sql.into(),
            params,
        }
    }
}

/// Column definition for structured CREATE TABLE.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    /// Column type, interpolated verbatim (e.g. "VARCHAR(100)")
    #[serde(rename = "type")]
    pub type_name: String,
    /// Constraints appended verbatim in the given order
    #[serde(default)]
    pub constraints: Vec<String>,
    /// `None` when the key is absent, `Some(Value::Null)` for an explicit null
    #[serde(default, deserialize_with = "deserialize_some")]
    pub default: Option<Value>,
}

fn deserialize_some<'de, D>(deserializer: D) -> std::result::Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Table-level options for structured CREATE TABLE.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableOptions {
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
}

/// Quotes an identifier in backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Renders a DEFAULT literal: strings single-quoted with quotes doubled,
/// numbers and booleans as-is, null as NULL.
pub fn default_literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Value::Array(_) | Value::Object(_) => Err(AdminError::validation(
            "Default value must be a string, number, boolean or null",
        )),
    }
}

/// Compiles operation arguments into statements.
#[derive(Debug, Clone)]
pub struct Compiler {
    validator: Validator,
    max_results: u64,
}

impl Compiler {
    pub fn new(validator: Validator, max_results: u64) -> Self {
        Compiler {
            validator,
            max_results,
        }
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    fn table(&self, name: &str) -> Result<String> {
        self.validator.identifier("table", name)?;
        Ok(quote_ident(name))
    }

    fn column(&self, name: &str) -> Result<String> {
        self.validator.identifier("column", name)?;
        Ok(quote_ident(name))
    }

    fn database(&self, name: &str) -> Result<String> {
        self.validator.identifier("database", name)?;
        Ok(quote_ident(name))
    }

    fn option(&self, what: &str, value: &str) -> Result<String> {
        if self.validator.is_valid_identifier(value) {
            Ok(value.to_string())
        } else {
            Err(AdminError::validation(format!(
                "Invalid {} '{}': contains invalid characters",
                what, value
            )))
        }
    }

    /// Clamps a requested row limit to the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns a validation error for negative limits.
    pub fn clamp_limit(&self, limit: i64) -> Result<u64> {
        if limit < 0 {
            return Err(AdminError::validation("Limit must be non-negative"));
        }
        Ok((limit as u64).min(self.max_results))
    }

    /// Builds `col1 = ? AND col2 = ?` in key order, appending values to `params`.
    fn equality_clause(
        &self,
        map: &Map<String, Value>,
        separator: &str,
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let mut clauses = Vec::with_capacity(map.len());
        for (key, value) in map {
            clauses.push(format!("{} = ?", self.column(key)?));
            params.push(value.clone());
        }
        Ok(clauses.join(separator))
    }

    /// Compiles a filter map into an AND-conjoined WHERE body and its parameters.
    pub fn where_clause(&self, filter: &Map<String, Value>) -> Result<(String, Vec<Value>)> {
        if filter.is_empty() {
            return Err(AdminError::validation("Where conditions must be a non-empty object"));
        }
        let mut params = Vec::with_capacity(filter.len());
        let clause = self.equality_clause(filter, " AND ", &mut params)?;
        Ok((clause, params))
    }

    /// `SELECT *` page with a clamped limit.
    pub fn select_page(&self, table: &str, limit: i64, offset: i64) -> Result<Statement> {
        let table = self.table(table)?;
        if offset < 0 {
            return Err(AdminError::validation("Offset must be non-negative"));
        }
        let limit = self.clamp_limit(limit)?;
        Ok(Statement::new(format!(
            "SELECT * FROM {} LIMIT {} OFFSET {}",
            table, limit, offset
        )))
    }

    /// Substring search on one column, the value bound as `%value%`.
    pub fn search(&self, table: &str, column: &str, value: &str, limit: i64) -> Result<Statement> {
        let table = self.table(table)?;
        let column = self.column(column)?;
        let limit = self.clamp_limit(limit)?;
        Ok(Statement::with_params(
            format!("SELECT * FROM {} WHERE {} LIKE ? LIMIT {}", table, column, limit),
            vec![Value::String(format!("%{}%", value))],
        ))
    }

    pub fn insert(&self, table: &str, row: &Map<String, Value>) -> Result<Statement> {
        let table = self.table(table)?;
        if row.is_empty() {
            return Err(AdminError::validation("Data must be a non-empty object"));
        }
        let columns = row
            .keys()
            .map(|key| self.column(key))
            .collect::<Result<Vec<_>>>()?;
        let placeholders = vec!["?"; columns.len()].join(", ");
        Ok(Statement::with_params(
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            ),
            row.values().cloned().collect(),
        ))
    }

    /// UPDATE with parameters ordered as set values followed by where values.
    pub fn update(
        &self,
        table: &str,
        set: &Map<String, Value>,
        filter: &Map<String, Value>,
    ) -> Result<Statement> {
        let table = self.table(table)?;
        if set.is_empty() {
            return Err(AdminError::validation("Data must be a non-empty object"));
        }
        let mut params = Vec::with_capacity(set.len() + filter.len());
        let set_clause = self.equality_clause(set, ", ", &mut params)?;
        let (where_clause, where_params) = self.where_clause(filter)?;
        params.extend(where_params);
        Ok(Statement::with_params(
            format!("UPDATE {} SET {} WHERE {}", table, set_clause, where_clause),
            params,
        ))
    }

    pub fn delete(&self, table: &str, filter: &Map<String, Value>) -> Result<Statement> {
        let table = self.table(table)?;
        let (where_clause, params) = self.where_clause(filter)?;
        Ok(Statement::with_params(
            format!("DELETE FROM {} WHERE {}", table, where_clause),
            params,
        ))
    }

    fn column_definition(
        &self,
        name: &str,
        type_name: &str,
        constraints: &[String],
        default: Option<&Value>,
    ) -> Result<String> {
        let name = self.column(name)?;
        if type_name.trim().is_empty() {
            return Err(AdminError::validation(format!("Column {} has no type", name)));
        }
        let mut definition = format!("{} {}", name, type_name.trim());
        for constraint in constraints.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
            definition.push(' ');
            definition.push_str(constraint);
        }
        if let Some(value) = default {
            definition.push_str(" DEFAULT ");
            definition.push_str(&default_literal(value)?);
        }
        Ok(definition)
    }

    /// Structured CREATE TABLE: one line per column, then table options.
    pub fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDef],
        options: Option<&TableOptions>,
    ) -> Result<Statement> {
        let table = self.table(table)?;
        if columns.is_empty() {
            return Err(AdminError::validation("Columns must be a non-empty list"));
        }
        let definitions = columns
            .iter()
            .map(|c| self.column_definition(&c.name, &c.type_name, &c.constraints, c.default.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let mut sql = format!("CREATE TABLE {} (\n  {}\n)", table, definitions.join(",\n  "));
        if let Some(options) = options {
            if let Some(engine) = &options.engine {
                sql.push_str(&format!(" ENGINE={}", self.option("engine", engine)?));
            }
            if let Some(charset) = &options.charset {
                sql.push_str(&format!(" CHARACTER SET {}", self.option("charset", charset)?));
            }
            if let Some(collation) = &options.collation {
                sql.push_str(&format!(" COLLATE {}", self.option("collation", collation)?));
            }
        }
        Ok(Statement::new(sql))
    }

    /// `ALTER TABLE … ADD COLUMN`. `after` is applied only when it is a valid identifier.
    pub fn add_column(
        &self,
        table: &str,
        column: &str,
        column_type: &str,
        constraints: &[String],
        default: Option<&Value>,
        after: Option<&str>,
    ) -> Result<Statement> {
        let table = self.table(table)?;
        let definition = self.column_definition(column, column_type, constraints, default)?;
        let mut sql = format!("ALTER TABLE {} ADD COLUMN {}", table, definition);
        if let Some(after) = after.filter(|a| self.validator.is_valid_identifier(a)) {
            sql.push_str(&format!(" AFTER {}", quote_ident(after)));
        }
        Ok(Statement::new(sql))
    }

    pub fn drop_column(&self, table: &str, column: &str) -> Result<Statement> {
        Ok(Statement::new(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.table(table)?,
            self.column(column)?
        )))
    }

    pub fn modify_column(
        &self,
        table: &str,
        column: &str,
        new_type: &str,
        constraints: &[String],
        default: Option<&Value>,
    ) -> Result<Statement> {
        let table = self.table(table)?;
        let definition = self.column_definition(column, new_type, constraints, default)?;
        Ok(Statement::new(format!("ALTER TABLE {} MODIFY COLUMN {}", table, definition)))
    }

    pub fn rename_table(&self, old: &str, new: &str) -> Result<Statement> {
        Ok(Statement::new(format!(
            "RENAME TABLE {} TO {}",
            self.table(old)?,
            self.table(new)?
        )))
    }

    pub fn create_index(
        &self,
        table: &str,
        index: &str,
        columns: &[String],
        index_type: &str,
        unique: bool,
    ) -> Result<Statement> {
        let table = self.table(table)?;
        self.validator.identifier("index", index)?;
        if columns.is_empty() {
            return Err(AdminError::validation("Columns must be a non-empty list"));
        }
        let columns = columns
            .iter()
            .map(|c| self.column(c))
            .collect::<Result<Vec<_>>>()?;
        let index_type = self.option("index type", index_type)?;
        Ok(Statement::new(format!(
            "CREATE {}INDEX {} ON {} ({}) USING {}",
            if unique { "UNIQUE " } else { "" },
            quote_ident(index),
            table,
            columns.join(", "),
            index_type.to_uppercase()
        )))
    }

    pub fn drop_index(&self, table: &str, index: &str) -> Result<Statement> {
        let table = self.table(table)?;
        self.validator.identifier("index", index)?;
        Ok(Statement::new(format!("DROP INDEX {} ON {}", quote_ident(index), table)))
    }

    pub fn truncate(&self, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!("TRUNCATE TABLE {}", self.table(table)?)))
    }

    pub fn drop_table(&self, table: &str, if_exists: bool) -> Result<Statement> {
        Ok(Statement::new(format!(
            "DROP TABLE {}{}",
            if if_exists { "IF EXISTS " } else { "" },
            self.table(table)?
        )))
    }

    pub fn count_rows(&self, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!("SELECT COUNT(*) FROM {}", self.table(table)?)))
    }

    pub fn describe(&self, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!("DESCRIBE {}", self.table(table)?)))
    }

    pub fn show_index(&self, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!("SHOW INDEX FROM {}", self.table(table)?)))
    }

    pub fn create_database(&self, name: &str, charset: &str, collation: &str) -> Result<Statement> {
        Ok(Statement::new(format!(
            "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET {} COLLATE {}",
            self.database(name)?,
            self.option("charset", charset)?,
            self.option("collation", collation)?
        )))
    }

    /// Bare `CREATE DATABASE IF NOT EXISTS`, inheriting the server defaults.
    pub fn ensure_database(&self, name: &str) -> Result<Statement> {
        Ok(Statement::new(format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            self.database(name)?
        )))
    }

    pub fn drop_database(&self, name: &str, if_exists: bool) -> Result<Statement> {
        Ok(Statement::new(format!(
            "DROP DATABASE {}{}",
            if if_exists { "IF EXISTS " } else { "" },
            self.database(name)?
        )))
    }

    pub fn use_database(&self, name: &str) -> Result<Statement> {
        Ok(Statement::new(format!("USE {}", self.database(name)?)))
    }

    pub fn show_tables_from(&self, database: &str) -> Result<Statement> {
        Ok(Statement::new(format!("SHOW TABLES FROM {}", self.database(database)?)))
    }

    pub fn show_create_table(&self, database: &str, table: &str) -> Result<Statement> {
        Ok(Statement::new(format!(
            "SHOW CREATE TABLE {}.{}",
            self.database(database)?,
            self.table(table)?
        )))
    }

    /// Cross-database `INSERT … SELECT *` of every row of `table`.
    pub fn copy_rows(&self, source: &str, target: &str, table: &str) -> Result<Statement> {
        let table = self.table(table)?;
        Ok(Statement::new(format!(
            "INSERT INTO {}.{} SELECT * FROM {}.{}",
            self.database(target)?,
            table,
            self.database(source)?,
            table
        )))
    }
}

/// Removes `` `database`. `` qualifiers from a `SHOW CREATE TABLE` definition
/// so it can be replayed in another database.
pub fn strip_database_qualifier(definition: &str, database: &str) -> String {
    definition.replace(&format!("{}.", quote_ident(database)), "")
}
