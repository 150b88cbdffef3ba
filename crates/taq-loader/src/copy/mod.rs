//! Bulk-copy backends
//!
//! A backend loads one chunk file into the destination table with the
//! database's native COPY and reports how many rows went in. Every call owns
//! its own connection or client process, so backends are shared between
//! workers without locking.

mod native;
mod psql;

pub use native::PgCopy;
pub use psql::{parse_copy_tag, PsqlCopy};

use crate::config::{LoaderBackend, LoaderConfig};
use crate::error::{CopyError, LoaderError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Loads a chunk file into a table
#[async_trait]
pub trait BulkCopy: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Copy every line of `path` into `target`.
    ///
    /// Returns the row count reported by the server, or `None` when the
    /// backend could not read one back.
    async fn copy_file(
        &self,
        target: &CopyTarget,
        path: &Path,
    ) -> std::result::Result<Option<u64>, CopyError>;
}

/// Build the backend selected by `config`
pub fn backend_for(config: &LoaderConfig) -> Arc<dyn BulkCopy> {
    match config.backend {
        LoaderBackend::Native => Arc::new(PgCopy::new(config.database_url.clone())),
        LoaderBackend::Psql => Arc::new(PsqlCopy::new(
            config.psql_bin.clone(),
            config.database_url.clone(),
        )),
    }
}

/// Destination table and row format of a COPY
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyTarget {
    table: String,
    delimiter: char,
}

impl CopyTarget {
    /// Validate `table` and `delimiter`.
    ///
    /// Table names are plain SQL identifiers (`[A-Za-z_][A-Za-z0-9_]*`),
    /// optionally qualified by one schema. The delimiter must be a single
    /// ASCII character that cannot break the generated statement.
    pub fn new(table: &str, delimiter: char) -> Result<Self> {
        let parts: Vec<&str> = table.split('.').collect();
        if parts.len() > 2 || !parts.iter().all(|p| is_identifier(p)) {
            return Err(LoaderError::config(format!(
                "Invalid table name '{}': expected [schema.]table made of letters, digits and underscores",
                table
            )));
        }

        let printable = delimiter.is_ascii() && !delimiter.is_ascii_control();
        if !printable || matches!(delimiter, '\'' | '"' | '\\') {
            return Err(LoaderError::config(format!(
                "Invalid delimiter {:?}: use a single printable ASCII character other than quotes or backslash",
                delimiter
            )));
        }

        Ok(Self {
            table: table.to_string(),
            delimiter,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    fn options(&self) -> String {
        format!("WITH (FORMAT csv, DELIMITER '{}')", self.delimiter)
    }

    /// Server-side statement fed over the wire protocol
    pub fn copy_from_stdin(&self) -> String {
        format!("COPY {} FROM STDIN {}", self.table, self.options())
    }

    /// psql meta-command reading a client-side file
    pub fn psql_meta_command(&self, path: &Path) -> String {
        let quoted = path.to_string_lossy().replace('\'', "''");
        format!("\\copy {} FROM '{}' {}", self.table, quoted, self.options())
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
