/// Connection Management Module
///
/// This module owns the connection lifecycle: it turns configuration into
/// connection parameters, opens one connection per operation (optionally
/// bound to a database), instruments statement execution and guarantees
/// the connection is released on every exit path.

use crate::config::DatabaseConfig;
use crate::core::db::query::{format_params, QueryResult};
use crate::core::{AdminError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Parameters for a single connection attempt.
#[derive(Clone, PartialEq)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Database to bind the connection to (None for server-level access)
    pub database: Option<String>,
    pub charset: String,
    pub collation: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl ConnectParams {
    /// Returns a copy of these parameters bound to `database`.
    pub fn with_database(&self, database: &str) -> Self {
        ConnectParams {
            database: Some(database.to_string()),
            ..self.clone()
        }
    }

    /// Returns a copy of these parameters without a database.
    pub fn without_database(&self) -> Self {
        ConnectParams {
            database: None,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"********")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("collation", &self.collation)
            .finish()
    }
}

impl From<&DatabaseConfig> for ConnectParams {
    fn from(config: &DatabaseConfig) -> Self {
        ConnectParams {
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            password: config.password.clone(),
            database: None,
            charset: config.charset.clone(),
            collation: config.collation.clone(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
        }
    }
}

/// A relational engine that can open connections.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Opens a new connection with the given parameters.
    async fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Channel>>;
}

/// An open connection to the engine.
#[async_trait]
pub trait Channel: Send {
    /// Executes one statement with positional parameters.
    async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Closes the connection gracefully.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// What a connection is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Server-level access only (SHOW DATABASES, CREATE/DROP DATABASE)
    Server,
    /// Bound to the named database
    Database(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Server => write!(f, "(no database)"),
            Scope::Database(name) => write!(f, "to database '{}'", name),
        }
    }
}

/// A statement issued over a scoped connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Connection manager for database operations
///
/// Connections are never pooled: every acquisition opens a fresh connection
/// that belongs to exactly one operation.
#[derive(Clone)]
pub struct ConnectionManager {
    engine: Arc<dyn Engine>,
    params: ConnectParams,
}

impl ConnectionManager {
    /// Creates a new connection manager over `engine` using `params` as the base parameters
    pub fn new(engine: Arc<dyn Engine>, params: ConnectParams) -> Self {
        ConnectionManager { engine, params }
    }

    /// Base connection parameters (never bound to a database)
    pub fn params(&self) -> &ConnectParams {
        &self.params
    }

    /// Opens a connection for the given scope, applying the connect timeout.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Connection` when the engine cannot be reached,
    /// rejects the credentials, does not know the database, or does not
    /// answer within the connect timeout.
    pub async fn acquire(&self, scope: Scope) -> Result<ScopedConnection> {
        let params = match &scope {
            Scope::Server => self.params.without_database(),
            Scope::Database(name) => self.params.with_database(name),
        };

        let channel = tokio::time::timeout(params.connect_timeout, self.engine.connect(&params))
            .await
            .map_err(|_| {
                AdminError::Connection(format!(
                    "Timed out after {:?} connecting to {}:{}",
                    params.connect_timeout, params.host, params.port
                ))
            })?
            .map_err(|e| match e {
                AdminError::Execution(msg) => AdminError::Connection(msg),
                other => other,
            })?;

        debug!("MySQL connection established {}", scope);

        Ok(ScopedConnection {
            channel: Some(channel),
            scope,
            statement_timeout: params.read_timeout.max(params.write_timeout),
            history: Vec::new(),
        })
    }
}

/// A connection owned by one operation.
///
/// Every statement goes through [`ScopedConnection::execute`], which logs and
/// records it before handing it to the engine. The connection is closed by
/// [`ScopedConnection::release`]; if an operation bails out early the
/// connection is dropped instead, which closes the underlying socket.
pub struct ScopedConnection {
    channel: Option<Box<dyn Channel>>,
    scope: Scope,
    statement_timeout: Duration,
    history: Vec<ExecutedStatement>,
}

impl ScopedConnection {
    /// What this connection is bound to
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Statements issued over this connection so far, in order
    pub fn history(&self) -> &[ExecutedStatement] {
        &self.history
    }

    /// Whether the connection has been released
    pub fn is_released(&self) -> bool {
        self.channel.is_none()
    }

    /// Executes one statement, recording it before delegating to the engine.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Connection` if the connection was already released
    /// or the statement exceeded the read/write timeout, otherwise whatever the
    /// engine reports.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let channel = self
            .channel
            .as_mut()
            .ok_or_else(|| AdminError::Connection("Connection already released".to_string()))?;

        if params.is_empty() {
            info!("[SQL] {}", sql);
        } else {
            info!("[SQL] {} with params: {}", sql, format_params(params));
        }
        self.history.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        tokio::time::timeout(self.statement_timeout, channel.execute(sql, params))
            .await
            .map_err(|_| {
                AdminError::Connection(format!(
                    "Statement timed out after {:?}",
                    self.statement_timeout
                ))
            })?
    }

    /// Closes the underlying connection. Calling it again is a no-op.
    pub async fn release(&mut self) {
        if let Some(channel) = self.channel.take() {
            match channel.close().await {
                Ok(()) => debug!("MySQL connection closed {}", self.scope),
                Err(e) => warn!("Error while closing MySQL connection {}: {}", self.scope, e),
            }
        }
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if self.channel.take().is_some() {
            debug!("MySQL connection dropped {}", self.scope);
        }
    }
}
