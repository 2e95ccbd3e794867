/// Validation Module
///
/// Input checks applied before anything reaches SQL text.
///
/// Identifiers cannot be bound as statement parameters, so anything that
/// ends up interpolated into SQL text (table, column, index and database
/// names, charset and engine options) must match the identifier pattern
/// first. Ad-hoc queries are checked for shape, length and statement kind.

use crate::config::SecurityConfig;
use crate::core::{AdminError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use sqlparser::ast::Statement;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Identifier pattern used when no other pattern is configured
pub const DEFAULT_IDENTIFIER_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

/// Keywords that make a raw CREATE TABLE statement unacceptable.
///
/// This is a substring search, not a parser: keywords inside quoted
/// identifiers, comments or `ON UPDATE` clauses also trigger it.
pub const FORBIDDEN_CREATE_KEYWORDS: [&str; 7] =
    ["drop", "delete", "update", "insert", "grant", "revoke", "execute"];

static DEFAULT_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_IDENTIFIER_PATTERN).expect("default identifier pattern is valid"));

static CREATED_TABLE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"create\s+table\s+(?:if\s+not\s+exists\s+)?`?(\w+)`?")
        .expect("table name pattern is valid")
});

/// True iff `name` is non-empty and matches `^[A-Za-z0-9_-]+$`.
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty() && DEFAULT_IDENTIFIER.is_match(name)
}

/// True iff `query` is non-empty after trimming.
pub fn is_valid_adhoc_query(query: &str) -> bool {
    !query.trim().is_empty()
}

/// Checks a raw CREATE TABLE statement: it must start with `create table`
/// (case-insensitive, after trimming) and contain none of
/// [`FORBIDDEN_CREATE_KEYWORDS`].
pub fn check_create_table_sql(sql: &str) -> Result<()> {
    let lowered = sql.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(AdminError::validation(
            "CREATE TABLE SQL statement must be a non-empty string",
        ));
    }
    if has_multiple_statements(sql) {
        return Err(AdminError::validation("Only one statement per query is allowed"));
    }
    if !lowered.starts_with("create table") {
        return Err(AdminError::validation("Only CREATE TABLE statements are allowed"));
    }
    if let Some(keyword) = FORBIDDEN_CREATE_KEYWORDS
        .iter()
        .find(|keyword| lowered.contains(*keyword))
    {
        return Err(AdminError::validation(format!(
            "SQL statement contains forbidden keyword: {}",
            keyword
        )));
    }
    Ok(())
}

/// Pulls the table name out of a CREATE TABLE statement, or "unknown".
pub fn created_table_name(sql: &str) -> String {
    CREATED_TABLE_NAME
        .captures(&sql.trim().to_lowercase())
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn leading_keyword(sql: &str) -> String {
    let keyword: String = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    match keyword.to_uppercase().as_str() {
        "DESC" => "DESCRIBE".to_string(),
        "WITH" | "VALUES" | "TABLE" => "SELECT".to_string(),
        other => other.to_string(),
    }
}

fn statement_kind(statement: &Statement) -> String {
    match statement {
        Statement::Query(_) => "SELECT".to_string(),
        Statement::Insert { .. } => "INSERT".to_string(),
        Statement::Update { .. } => "UPDATE".to_string(),
        Statement::Delete { .. } => "DELETE".to_string(),
        Statement::CreateTable { .. } => "CREATE".to_string(),
        Statement::AlterTable { .. } => "ALTER".to_string(),
        Statement::Drop { .. } => "DROP".to_string(),
        other => leading_keyword(&other.to_string()),
    }
}

/// Counts the non-empty statements in `sql` as the server would split them
/// on `;`. Quoted strings, quoted identifiers and comments are skipped;
/// `/*! ... */` bodies are code to the server and are scanned like code.
/// Backslash escapes inside quotes are honoured when `backslash_escapes` is set.
fn count_statements(sql: &str, backslash_escapes: bool) -> usize {
    let chars: Vec<char> = sql.chars().collect();
    let mut count = 0;
    let mut pending = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                pending = true;
                i += 1;
                while i < chars.len() {
                    if backslash_escapes && c != '`' && chars[i] == '\\' {
                        i += 2;
                    } else if chars[i] == c && chars.get(i + 1) == Some(&c) {
                        i += 2;
                    } else if chars[i] == c {
                        break;
                    } else {
                        i += 1;
                    }
                }
                i += 1;
            }
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '-' if chars.get(i + 1) == Some(&'-')
                && chars.get(i + 2).map_or(true, |n| n.is_whitespace() || n.is_control()) =>
            {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') && chars.get(i + 2) != Some(&'!') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            ';' => {
                if pending {
                    count += 1;
                    pending = false;
                }
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            _ => {
                pending = true;
                i += 1;
            }
        }
    }
    if pending {
        count += 1;
    }
    count
}

/// True when `sql` holds more than one statement under either escaping mode
/// (`NO_BACKSLASH_ESCAPES` on or off).
pub fn has_multiple_statements(sql: &str) -> bool {
    count_statements(sql, true) > 1 || count_statements(sql, false) > 1
}

/// Classifies every statement in `sql` by kind ("SELECT", "INSERT", "SHOW", ...).
///
/// Uses the MySQL dialect parser; statements it cannot parse are classified
/// by their leading keyword.
pub fn statement_kinds(sql: &str) -> Vec<String> {
    match Parser::parse_sql(&MySqlDialect {}, sql) {
        Ok(statements) if !statements.is_empty() => statements.iter().map(statement_kind).collect(),
        _ => vec![leading_keyword(sql)],
    }
}

/// Validator configured from the security settings.
#[derive(Debug, Clone)]
pub struct Validator {
    pattern: Regex,
    max_query_length: usize,
    allowed_operations: Vec<String>,
}

impl Default for Validator {
    fn default() -> Self {
        Validator {
            pattern: DEFAULT_IDENTIFIER.clone(),
            max_query_length: SecurityConfig::default().max_query_length,
            allowed_operations: SecurityConfig::default().allowed_operations,
        }
    }
}

impl Validator {
    pub fn new(security: &SecurityConfig) -> Result<Self> {
        let pattern = Regex::new(&security.table_name_pattern).map_err(|e| {
            AdminError::Config(format!("Invalid table_name_pattern: {}", e))
        })?;
        Ok(Validator {
            pattern,
            max_query_length: security.max_query_length,
            allowed_operations: security
                .allowed_operations
                .iter()
                .map(|op| op.trim().to_uppercase())
                .collect(),
        })
    }

    /// True iff `name` is non-empty and matches the configured pattern.
    pub fn is_valid_identifier(&self, name: &str) -> bool {
        !name.is_empty() && self.pattern.is_match(name)
    }

    /// Checks one identifier; `what` names it in the error ("table", "column", ...).
    pub fn identifier(&self, what: &str, name: &str) -> Result<()> {
        if self.is_valid_identifier(name) {
            Ok(())
        } else {
            Err(AdminError::validation(format!(
                "Invalid {} name '{}': contains invalid characters",
                what, name
            )))
        }
    }

    /// Checks an ad-hoc query: non-empty, within the length limit, a single
    /// statement, and of an allowed kind.
    pub fn check_adhoc_query(&self, query: &str) -> Result<()> {
        if !is_valid_adhoc_query(query) {
            return Err(AdminError::validation("Query must be a non-empty string"));
        }
        if query.len() > self.max_query_length {
            return Err(AdminError::validation(format!(
                "Query is {} characters long, the limit is {}",
                query.len(),
                self.max_query_length
            )));
        }

        let kinds = statement_kinds(query);
        if kinds.len() > 1 || has_multiple_statements(query) {
            return Err(AdminError::validation("Only one statement per query is allowed"));
        }
        if self.allowed_operations.iter().any(|op| op == "*") {
            return Ok(());
        }
        for kind in &kinds {
            if !self.allowed_operations.contains(kind) {
                return Err(AdminError::validation(format!(
                    "{} statements are not allowed (allowed: {})",
                    if kind.is_empty() { "Unrecognized" } else { kind.as_str() },
                    self.allowed_operations.join(", ")
                )));
            }
        }
        Ok(())
    }
}
