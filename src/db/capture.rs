//! Diagnostic capture of rendered statements.
//!
//! When DEBUG logging is enabled for a client, every prepared statement is
//! also rendered with its arguments inlined as SQL literals. The rendered
//! text is kept for error reports and emitted at DEBUG. It is never sent to
//! the database.

use crate::db::params::PreparedQuery;
use tracing::{debug, trace};

/// Best-effort record of the last statement the client ran.
#[derive(Debug, Default)]
pub struct QueryCapture {
    last: Option<String>,
}

impl QueryCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render `prepared` and remember it.
    ///
    /// Values without a literal form (NaN, infinities) make the statement
    /// unrenderable; the previous capture is dropped and nothing is logged.
    pub fn record(&mut self, prepared: &PreparedQuery) {
        match prepared.render() {
            Ok(sql) => {
                debug!(dialect = %prepared.dialect(), sql = %sql, "Rendered query");
                self.last = Some(sql);
            }
            Err(reason) => {
                trace!(reason = %reason, "Query not rendered");
                self.last = None;
            }
        }
    }

    /// Forget the last statement.
    pub fn clear(&mut self) {
        self.last = None;
    }

    /// Last successfully rendered statement.
    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}
