//! Named parameter preparation and binding.
//!
//! Callers write SQL with `:name` placeholders and pass a [`Params`] map.
//! [`prepare`] turns that pair into a [`PreparedQuery`]: SQL text with the
//! dialect's positional placeholders (`?` or `$n`) plus the argument list in
//! bind order. The `bind_*_param` helpers then attach the arguments to a
//! database-specific `sqlx` query.
//!
//! Placeholder recognition:
//! - `:name` where `name` is word characters (Unicode letters, digits and
//!   `_`), not preceded by a word character (so `10:30` and `a:b` are left
//!   alone)
//! - `::` is a cast and never starts a placeholder
//! - `\:` is an escaped colon and is emitted as `:`
//! - quoted strings, quoted identifiers and comments are copied verbatim,
//!   including PostgreSQL `E'...'` escape strings and `$tag$...$tag$` bodies

use crate::error::{DbError, DbResult};
use crate::models::{Dialect, Params, QueryParam};
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};
use std::collections::HashMap;

/// A statement ready for the driver.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    dialect: Dialect,
    sql: String,
    args: Vec<QueryParam>,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Text(String),
    /// Index into `args`
    Arg(usize),
}

impl PreparedQuery {
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// SQL text with positional placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Arguments in bind order.
    pub fn args(&self) -> &[QueryParam] {
        &self.args
    }

    /// Render the statement with every argument inlined as an escaped SQL
    /// literal. Used for diagnostics only; the driver always receives
    /// [`sql`](Self::sql) and [`args`](Self::args).
    pub fn render(&self) -> Result<String, String> {
        let mut out = String::with_capacity(self.sql.len());
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Arg(idx) => {
                    let param = self
                        .args
                        .get(*idx)
                        .ok_or_else(|| format!("argument {} out of range", idx))?;
                    out.push_str(&render_literal(param, self.dialect)?);
                }
            }
        }
        Ok(out)
    }
}

/// Piece of tokenized query text.
#[derive(Debug, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Param(&'a str),
}

/// Compile `query` and bind `params` by name.
///
/// Fails when the text is empty or cannot be tokenized, when a placeholder
/// has no value, or when a parameter matches no placeholder.
pub fn prepare(query: &str, params: &Params, dialect: Dialect) -> DbResult<PreparedQuery> {
    if query.trim().is_empty() {
        return Err(DbError::preparation("query text is empty", query));
    }

    let pieces = tokenize(query, dialect).map_err(|msg| DbError::preparation(msg, query))?;

    let mut sql = String::with_capacity(query.len());
    let mut args = Vec::new();
    let mut segments = Vec::with_capacity(pieces.len());
    // Postgres can reference the same $n twice; `?` dialects need one arg per occurrence
    let mut numbered: HashMap<&str, usize> = HashMap::new();

    for piece in &pieces {
        match *piece {
            Piece::Text(text) => {
                sql.push_str(text);
                segments.push(Segment::Text(text.to_string()));
            }
            Piece::Param(name) => {
                let value = params.get(name).ok_or_else(|| {
                    DbError::preparation(
                        format!("missing value for bind parameter '{}'", name),
                        query,
                    )
                })?;
                let idx = match dialect {
                    Dialect::PostgreSql => *numbered.entry(name).or_insert_with(|| {
                        args.push(value.clone());
                        args.len() - 1
                    }),
                    _ => {
                        args.push(value.clone());
                        args.len() - 1
                    }
                };
                sql.push_str(&placeholder(dialect, idx + 1));
                segments.push(Segment::Arg(idx));
            }
        }
    }

    if let Some(unused) = params.keys().find(|key| {
        !pieces
            .iter()
            .any(|piece| matches!(piece, Piece::Param(name) if *name == key.as_str()))
    }) {
        return Err(DbError::preparation(
            format!("query has no bind parameter named '{}'", unused),
            query,
        ));
    }

    Ok(PreparedQuery {
        dialect,
        sql,
        args,
        segments,
    })
}

/// Positional placeholder for the 1-based argument `index`.
fn placeholder(dialect: Dialect, index: usize) -> String {
    match dialect {
        Dialect::PostgreSql => format!("${}", index),
        Dialect::SqlServer => format!("@p{}", index),
        Dialect::MySql | Dialect::SQLite => "?".to_string(),
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Byte length of the run of word characters at the start of `text`.
fn word_len(text: &str) -> usize {
    text.find(|c: char| !is_word(c)).unwrap_or(text.len())
}

/// Whether the character just before byte offset `at` is a word character.
fn follows_word(query: &str, at: usize) -> bool {
    query[..at].chars().next_back().is_some_and(is_word)
}

/// Whether the quote at `at` opens a PostgreSQL `E'...'` escape string.
fn is_escape_string(query: &str, at: usize) -> bool {
    at > 0
        && matches!(query.as_bytes()[at - 1], b'E' | b'e')
        && !follows_word(query, at - 1)
}

/// Split `query` into verbatim text and `:name` placeholders.
///
/// All delimiters are ASCII, so every slice boundary is a char boundary.
fn tokenize(query: &str, dialect: Dialect) -> Result<Vec<Piece<'_>>, String> {
    let bytes = query.as_bytes();
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let next = bytes.get(i + 1).copied();
        match bytes[i] {
            b'\'' if dialect == Dialect::PostgreSql && is_escape_string(query, i) => {
                i = skip_quoted(bytes, i, b'\'', true)?;
            }
            quote @ (b'\'' | b'"' | b'`') => {
                let backslash_escapes = dialect == Dialect::MySql && quote != b'`';
                i = skip_quoted(bytes, i, quote, backslash_escapes)?;
            }
            b'$' if dialect == Dialect::PostgreSql && !follows_word(query, i) => {
                i = skip_dollar_quoted(query, i)?;
            }
            b'-' if next == Some(b'-') => {
                i = skip_line_comment(bytes, i);
            }
            b'#' if dialect == Dialect::MySql => {
                i = skip_line_comment(bytes, i);
            }
            b'/' if next == Some(b'*') => {
                i = query[i + 2..]
                    .find("*/")
                    .map(|end| i + 2 + end + 2)
                    .ok_or_else(|| format!("unterminated block comment at offset {}", i))?;
            }
            b'\\' if next == Some(b':') => {
                if start < i {
                    pieces.push(Piece::Text(&query[start..i]));
                }
                pieces.push(Piece::Text(":"));
                i += 2;
                start = i;
            }
            b':' if next == Some(b':') => {
                i += 2;
            }
            b':' => {
                let name_end = i + 1 + word_len(&query[i + 1..]);
                if name_end > i + 1 && !follows_word(query, i) {
                    if start < i {
                        pieces.push(Piece::Text(&query[start..i]));
                    }
                    pieces.push(Piece::Param(&query[i + 1..name_end]));
                    start = name_end;
                }
                i = name_end.max(i + 1);
            }
            _ => i += 1,
        }
    }

    if start < bytes.len() {
        pieces.push(Piece::Text(&query[start..]));
    }
    Ok(pieces)
}

/// Return the offset just past the quoted section opened at `open`.
fn skip_quoted(
    bytes: &[u8],
    open: usize,
    quote: u8,
    backslash_escapes: bool,
) -> Result<usize, String> {
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && backslash_escapes {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return Ok(i + 1);
        }
        i += 1;
    }
    Err(format!(
        "unterminated quoted literal starting at offset {}",
        open
    ))
}

/// Return the offset just past a `$tag$ ... $tag$` body opened at `open`.
/// A `$` that does not open one (e.g. `$1`) is skipped alone.
fn skip_dollar_quoted(query: &str, open: usize) -> Result<usize, String> {
    let rest = &query[open + 1..];
    let tag_len = word_len(rest);
    if rest.starts_with(|c: char| c.is_ascii_digit()) || !rest[tag_len..].starts_with('$') {
        return Ok(open + 1);
    }
    let body = open + tag_len + 2;
    let delimiter = &query[open..body];
    query[body..]
        .find(delimiter)
        .map(|end| body + end + delimiter.len())
        .ok_or_else(|| {
            format!(
                "unterminated dollar-quoted string starting at offset {}",
                open
            )
        })
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|len| start + len + 1)
        .unwrap_or(bytes.len())
}

/// Render one value as a SQL literal for `dialect`.
fn render_literal(param: &QueryParam, dialect: Dialect) -> Result<String, String> {
    match param {
        QueryParam::Null => Ok("NULL".to_string()),
        QueryParam::Bool(v) => Ok(match (dialect, v) {
            (Dialect::PostgreSql, true) => "TRUE".to_string(),
            (Dialect::PostgreSql, false) => "FALSE".to_string(),
            (_, true) => "1".to_string(),
            (_, false) => "0".to_string(),
        }),
        QueryParam::Int(v) => Ok(v.to_string()),
        QueryParam::Float(v) if v.is_finite() => Ok(v.to_string()),
        QueryParam::Float(v) => Err(format!("{} has no SQL literal form", v)),
        QueryParam::String(v) => Ok(quote_string(v, dialect)),
        QueryParam::Json(v) => Ok(quote_string(&v.to_string(), dialect)),
    }
}

fn quote_string(value: &str, dialect: Dialect) -> String {
    let escaped = match dialect {
        Dialect::MySql => value
            .replace('\\', "\\\\")
            .replace('\0', "\\0")
            .replace('\'', "''"),
        _ => value.replace('\'', "''"),
    };
    format!("'{}'", escaped)
}

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q QueryParam,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        // SQLite doesn't have native JSON type, store as string
        QueryParam::Json(v) => query.bind(v.to_string()),
    }
}
