/// Operation Catalog Module
///
/// The administrative and CRUD operations exposed to callers. Every public
/// operation returns an [`Envelope`] and never fails outward: validation,
/// precondition, connection and execution failures are logged and turned
/// into error envelopes at the operation's own boundary.
///
/// ## Layout
///
/// - **Rows and ad-hoc SQL** (`data.rs`): reads, writes, searches, table creation
/// - **Table structure** (`tables.rs`): columns, indexes, rename, truncate, drop
/// - **Databases** (`databases.rs`): listing, session switching, create, copy, rename, delete
///
/// Database-scoped operations snapshot the active database once, before any
/// validation or connection, and use that snapshot for their whole lifetime.
mod data;
mod databases;
mod tables;

use crate::config::{Config, ManagementConfig, SecurityConfig};
use crate::core::db::{ConnectParams, ConnectionManager, Engine, QueryResult, Scope, ScopedConnection};
use crate::core::Result;
use crate::envelope::Envelope;
use crate::session::Session;
use crate::sql::{Compiler, Statement};
use crate::validation::Validator;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info};

/// The operation catalog over one engine and one session.
pub struct Catalog {
    connections: ConnectionManager,
    session: Arc<Session>,
    compiler: Compiler,
    security: SecurityConfig,
    management: ManagementConfig,
}

impl Catalog {
    /// Creates a catalog with a fresh, unset session.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Config` when the identifier pattern does not compile.
    pub fn new(engine: Arc<dyn Engine>, config: &Config) -> Result<Self> {
        Catalog::with_session(engine, config, Arc::new(Session::new()))
    }

    /// Creates a catalog sharing an existing session.
    pub fn with_session(engine: Arc<dyn Engine>, config: &Config, session: Arc<Session>) -> Result<Self> {
        let validator = Validator::new(&config.security)?;
        Ok(Catalog {
            connections: ConnectionManager::new(engine, ConnectParams::from(&config.database)),
            session,
            compiler: Compiler::new(validator, config.security.max_results),
            security: config.security.clone(),
            management: config.management.clone(),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Runs one operation body and converts its outcome into an envelope.
    async fn run<F>(&self, operation: &str, failure: impl Into<String>, work: F) -> Envelope
    where
        F: Future<Output = Result<(Value, String)>>,
    {
        let outcome = work.await.map_err(|err| (err, failure.into()));
        finish(operation, outcome)
    }

    /// Connection bound to `database`
    async fn connect_to(&self, database: &str) -> Result<ScopedConnection> {
        self.connections
            .acquire(Scope::Database(database.to_string()))
            .await
    }

    /// Server-level connection
    async fn connect_server(&self) -> Result<ScopedConnection> {
        self.connections.acquire(Scope::Server).await
    }
}

/// Logs the outcome of an operation and builds its envelope.
fn finish(
    operation: &str,
    outcome: std::result::Result<(Value, String), (crate::core::AdminError, String)>,
) -> Envelope {
    match outcome {
        Ok((data, message)) => {
            info!("[CLIENT CALL] {} completed successfully", operation);
            Envelope::success(data, message)
        }
        Err((err, message)) => {
            error!("[CLIENT CALL] {} failed with error: {}", operation, err);
            Envelope::failure(&err, message)
        }
    }
}

/// Executes a compiled statement over `conn`.
async fn exec(conn: &mut ScopedConnection, statement: &Statement) -> Result<QueryResult> {
    conn.execute(&statement.sql, &statement.params).await
}
