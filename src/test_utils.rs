/// # Test Utilities Module
///
/// In-memory engine for exercising the connection manager and the operation
/// catalog without a MySQL server.
///
/// This module provides:
/// - `ScriptedEngine`, an [`Engine`] that answers statements from scripted rules
/// - Recording of every connect attempt, statement and close
/// - Helpers for building result sets
use crate::core::db::{Channel, ConnectParams, Engine, QueryResult};
use crate::core::{AdminError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A statement as seen by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedStatement {
    /// Database the issuing connection was bound to
    pub database: Option<String>,
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone)]
enum Response {
    Rows(QueryResult),
    Fail(String),
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    response: Response,
}

#[derive(Debug, Default)]
struct State {
    rules: Vec<Rule>,
    refused: HashSet<String>,
    unreachable: bool,
    connects: Vec<ConnectParams>,
    statements: Vec<RecordedStatement>,
    closes: usize,
}

/// Scripted engine shared between a test and the code under test.
///
/// Statements are answered by the most recently added rule whose pattern is
/// a substring of the SQL text; unmatched statements succeed with an empty
/// result.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<State>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        ScriptedEngine::default()
    }

    /// Connection parameters used by tests
    pub fn params() -> ConnectParams {
        ConnectParams {
            host: "db.test".to_string(),
            port: 3306,
            user: "admin".to_string(),
            password: "s3cr3t-pw".to_string(),
            database: None,
            charset: "utf8mb4".to_string(),
            collation: "utf8mb4_unicode_ci".to_string(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Answers statements containing `pattern` with `result`.
    pub fn respond(&self, pattern: &str, result: QueryResult) -> &Self {
        self.state().rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Rows(result),
        });
        self
    }

    /// Fails statements containing `pattern` with an execution error.
    pub fn fail(&self, pattern: &str, message: &str) -> &Self {
        self.state().rules.push(Rule {
            pattern: pattern.to_string(),
            response: Response::Fail(message.to_string()),
        });
        self
    }

    /// Refuses connections bound to `database`, like an unknown database.
    pub fn refuse_database(&self, database: &str) -> &Self {
        self.state().refused.insert(database.to_string());
        self
    }

    /// Refuses every connection, like an unreachable server.
    pub fn set_unreachable(&self) -> &Self {
        self.state().unreachable = true;
        self
    }

    pub fn connects(&self) -> Vec<ConnectParams> {
        self.state().connects.clone()
    }

    pub fn statements(&self) -> Vec<RecordedStatement> {
        self.state().statements.clone()
    }

    /// SQL text of every statement, in execution order
    pub fn sql_log(&self) -> Vec<String> {
        self.state().statements.iter().map(|s| s.sql.clone()).collect()
    }

    pub fn closes(&self) -> usize {
        self.state().closes
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Channel>> {
        let mut state = self.state();
        state.connects.push(params.clone());
        if state.unreachable {
            return Err(AdminError::Connection(format!(
                "Can't connect to MySQL server on '{}:{}'",
                params.host, params.port
            )));
        }
        if let Some(database) = &params.database {
            if state.refused.contains(database) {
                return Err(AdminError::Connection(format!("Unknown database '{}'", database)));
            }
        }
        Ok(Box::new(ScriptedChannel {
            state: Arc::clone(&self.state),
            database: params.database.clone(),
        }))
    }
}

struct ScriptedChannel {
    state: Arc<Mutex<State>>,
    database: Option<String>,
}

#[async_trait]
impl Channel for ScriptedChannel {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.statements.push(RecordedStatement {
            database: self.database.clone(),
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        let response = state
            .rules
            .iter()
            .rev()
            .find(|rule| sql.contains(&rule.pattern))
            .map(|rule| rule.response.clone());
        match response {
            Some(Response::Rows(result)) => Ok(result),
            Some(Response::Fail(message)) => Err(AdminError::Execution(message)),
            None => Ok(QueryResult::default()),
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl Drop for ScriptedChannel {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.closes += 1;
    }
}

/// Builds a result set from column names and rows.
pub fn rows(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

/// Builds a single-column listing such as `SHOW TABLES`.
pub fn listing(column: &str, names: &[&str]) -> QueryResult {
    rows(
        &[column],
        names.iter().map(|n| vec![Value::String(n.to_string())]).collect(),
    )
}
