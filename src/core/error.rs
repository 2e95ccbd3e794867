/// Error Module
///
/// This module defines the error taxonomy for mysqladm. Every failure an
/// operation can hit maps onto one of these variants, and the operation
/// catalog converts them into error envelopes at its boundary.
use thiserror::Error;

/// Comprehensive error type for mysqladm.
///
/// The variants follow the way failures are reported back to the caller:
/// - Input problems (bad identifiers, bad query shape, missing arguments)
/// - Missing session preconditions (no active database)
/// - Engine connectivity (unreachable server, rejected credentials, lost link)
/// - Statement execution (syntax, constraint violations, missing objects)
/// - Configuration loading and validation
/// - File system and JSON handling
#[derive(Error, Debug)]
pub enum AdminError {
    /// Bad identifier, bad query shape, missing or invalid structured argument
    #[error("Validation error: {0}")]
    Validation(String),

    /// No active database selected
    #[error("No database selected")]
    NoActiveDatabase,

    /// Engine unreachable, credentials rejected or connection lost mid-operation
    #[error("Connection error: {0}")]
    Connection(String),

    /// The engine rejected the compiled statement
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing and validation errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AdminError {
    /// Short category label used in logs and envelopes.
    pub fn kind(&self) -> &'static str {
        match self {
            AdminError::Validation(_) => "ValidationError",
            AdminError::NoActiveDatabase => "PreconditionError",
            AdminError::Connection(_) => "ConnectionError",
            AdminError::Execution(_) => "ExecutionError",
            AdminError::Config(_) => "ConfigError",
            AdminError::Io(_) => "IoError",
            AdminError::Json(_) => "JsonError",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        AdminError::Validation(msg.into())
    }
}

impl From<sqlx::Error> for AdminError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Configuration(_) => AdminError::Connection(err.to_string()),
            // Access denied (1044/1045) and unknown database (1049) surface at connect time
            sqlx::Error::Database(ref db)
                if matches!(db.code().as_deref(), Some("28000") | Some("42000"))
                    && db.message().to_lowercase().contains("access denied") =>
            {
                AdminError::Connection(err.to_string())
            }
            other => AdminError::Execution(other.to_string()),
        }
    }
}

/// Type alias for Result to use AdminError as the error type.
pub type Result<T> = std::result::Result<T, AdminError>;
