/// Core Module for mysqladm
///
/// This module contains the fundamental components that the operation
/// catalog is built on: the error taxonomy and the database layer
/// (connection lifecycle, result sets, the MySQL engine and schema views).

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{AdminError, Result};
