//! sqldb library
//!
//! A thin relational database client: parameterized SQL with `:name`
//! placeholders, buffered JSON rows, and caller-held sessions in which every
//! statement runs in its own savepoint (MySQL, PostgreSQL, SQLite).

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use client::Client;
pub use config::{Config, PoolOptions};
pub use db::Session;
pub use error::{DbError, DbResult};
pub use models::{ConnectionConfig, Dialect, ExecuteOptions, Params, QueryParam, Row};
