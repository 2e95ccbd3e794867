/// Database Module
///
/// This module provides the database layer for mysqladm, organized into
/// focused submodules.
///
/// ## Architecture
///
/// - **Connection Management** (`connection.rs`): engine seam, connection parameters,
///   scoped connections with instrumented execution and guaranteed release
/// - **Query Results** (`query.rs`): result sets, affected counts and value conversion
/// - **MySQL Engine** (`mysql.rs`): the production wire client built on `sqlx`
/// - **Schema Views** (`schema.rs`): typed views over introspection result sets
///
/// ## Error Handling
///
/// All database operations use the standardized `AdminError` type for consistent error propagation.
pub mod connection;
pub mod mysql;
pub mod query;
pub mod schema;

pub use connection::*;
pub use mysql::MySqlEngine;
pub use query::*;
pub use schema::*;
