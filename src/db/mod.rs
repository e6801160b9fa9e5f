//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Backend dispatch macros
//! - Lazy connection pools
//! - Named parameter preparation and binding
//! - Row materialization
//! - Statement execution
//! - Transactional sessions with per-statement savepoints
//! - Diagnostic capture of rendered statements

#[macro_use]
pub mod macros;
pub mod capture;
pub mod executor;
pub mod params;
pub mod pool;
pub mod session;
pub mod types;

pub use capture::QueryCapture;
pub use executor::Outcome;
pub use params::{PreparedQuery, prepare};
pub use pool::DbPool;
pub use session::{DbTransaction, Session};
