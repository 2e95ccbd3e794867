// Core infrastructure modules
pub mod config;
pub mod core;
pub mod logging;

// Request handling, from input checks down to the engine
pub mod catalog;
pub mod envelope;
pub mod session;
pub mod sql;
pub mod validation;

// Tool surface and protocol host
pub mod server;
pub mod tools;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
