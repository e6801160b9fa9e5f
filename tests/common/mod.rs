//! Shared helpers for integration tests.

#![allow(dead_code)]

use sqldb::{Client, ConnectionConfig, ExecuteOptions, Params};
use std::io;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing::{Dispatch, Level};

/// In-memory log sink for a test dispatcher.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A dispatcher writing plain-text records at `level` and above into a buffer.
pub fn buffered_dispatch(level: Level) -> (Dispatch, LogBuffer) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (Dispatch::new(subscriber), buffer)
}

/// Configuration for a fresh SQLite database file inside `dir`.
pub fn sqlite_config(dir: &TempDir) -> ConnectionConfig {
    ConnectionConfig::sqlite(dir.path().join("test.db").to_string_lossy())
}

/// Client on a fresh SQLite database file inside `dir`.
pub fn sqlite_client(dir: &TempDir) -> Client {
    Client::new(sqlite_config(dir)).unwrap()
}

/// Run DDL or setup statements without fetching rows.
pub async fn setup(client: &mut Client, statements: &[&str]) {
    for sql in statements {
        client
            .execute(sql, &Params::new(), ExecuteOptions::no_results())
            .await
            .unwrap();
    }
}

/// `SELECT COUNT(*)` of `table` through a pooled connection.
pub async fn count(client: &mut Client, table: &str) -> i64 {
    let rows = client
        .execute(
            &format!("SELECT COUNT(*) AS n FROM {}", table),
            &Params::new(),
            ExecuteOptions::default(),
        )
        .await
        .unwrap();
    rows[0]["n"].as_i64().unwrap()
}
