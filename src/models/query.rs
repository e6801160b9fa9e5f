//! Query-related data models.
//!
//! This module defines bind parameter values, materialized rows and the
//! per-call execution options.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arrays and objects, bound as JSON
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }

    /// Parse a command-line value: JSON scalars and documents keep their
    /// type, anything else is taken as a plain string.
    pub fn parse_lenient(s: &str) -> Self {
        serde_json::from_str::<JsonValue>(s)
            .map(Self::from)
            .unwrap_or_else(|_| Self::String(s.to_string()))
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for QueryParam {
    fn from(v: u32) -> Self {
        Self::Int(v.into())
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl From<JsonValue> for QueryParam {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => n.as_f64().map(Self::Float).unwrap_or(Self::Json(JsonValue::Number(n))),
            },
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// Named bind parameters, keyed by placeholder name (without the colon).
pub type Params = BTreeMap<String, QueryParam>;

/// One materialized row: column name to value, in the order the engine
/// returned the columns.
pub type Row = serde_json::Map<String, JsonValue>;

/// Per-call switches shared by `execute` and `session_execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Materialize the rows into the client's result set.
    pub get_results: bool,
    /// Treat zero materialized rows as [`DbError::QueryEmptyResult`](crate::DbError::QueryEmptyResult).
    pub check_empty: bool,
}

impl ExecuteOptions {
    /// Run the statement without materializing rows (writes, DDL).
    pub fn no_results() -> Self {
        Self {
            get_results: false,
            check_empty: false,
        }
    }

    /// Materialize rows and accept an empty result.
    pub fn allow_empty() -> Self {
        Self {
            get_results: true,
            check_empty: false,
        }
    }
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            get_results: true,
            check_empty: true,
        }
    }
}
