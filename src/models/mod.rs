//! Data models for the database client.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, Dialect};
pub use query::{ExecuteOptions, Params, QueryParam, Row};
