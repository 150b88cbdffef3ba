//! Loader configuration
//!
//! [`LoaderConfig`] is assembled from CLI flags (which in turn read the
//! environment through clap) and checked with [`LoaderConfig::validate`]
//! before any file is touched.

use crate::copy::CopyTarget;
use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Defaults
// ============================================================================

/// Default number of chunks, which is also the number of concurrent loads
pub const DEFAULT_CHUNKS: usize = 8;

/// Default destination table
pub const DEFAULT_TABLE: &str = "taq_trades";

/// Column delimiter used by TAQ trade files
pub const DEFAULT_DELIMITER: char = '|';

/// Connection target used when nothing else is configured
pub const DEFAULT_DATABASE_URL: &str = "postgres:///postgres";

/// Which bulk-copy mechanism loads each chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LoaderBackend {
    /// COPY FROM STDIN over a dedicated sqlx connection per chunk
    #[default]
    Native,
    /// `psql -c "\copy ..."`, one client process per chunk
    Psql,
}

impl std::fmt::Display for LoaderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderBackend::Native => write!(f, "native"),
            LoaderBackend::Psql => write!(f, "psql"),
        }
    }
}

/// Everything a load run needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Pipe-delimited source file (header first, sentinel last)
    pub source: PathBuf,

    /// Requested chunk count; also the concurrency level
    pub chunks: usize,

    /// Destination table, optionally schema-qualified
    pub table: String,

    /// Column delimiter of the source file
    pub delimiter: char,

    /// PostgreSQL connection URL
    pub database_url: String,

    /// Bulk-copy backend
    pub backend: LoaderBackend,

    /// psql binary used by the psql backend
    pub psql_bin: PathBuf,

    /// Directory for temporary chunk files
    pub work_dir: PathBuf,

    /// Draw a progress bar while chunks load
    #[serde(default)]
    pub show_progress: bool,
}

impl LoaderConfig {
    /// Start building a configuration for `source`
    pub fn builder(source: impl Into<PathBuf>) -> LoaderConfigBuilder {
        LoaderConfigBuilder {
            config: LoaderConfig {
                source: source.into(),
                chunks: DEFAULT_CHUNKS,
                table: DEFAULT_TABLE.to_string(),
                delimiter: DEFAULT_DELIMITER,
                database_url: DEFAULT_DATABASE_URL.to_string(),
                backend: LoaderBackend::default(),
                psql_bin: PathBuf::from("psql"),
                work_dir: std::env::temp_dir(),
                show_progress: false,
            },
        }
    }

    /// Check the configuration without touching the source file
    pub fn validate(&self) -> Result<()> {
        if self.chunks == 0 {
            return Err(LoaderError::config("Chunk count must be at least 1"));
        }

        if self.database_url.trim().is_empty() {
            return Err(LoaderError::config("Database URL cannot be empty"));
        }

        if self.backend == LoaderBackend::Psql && self.psql_bin.as_os_str().is_empty() {
            return Err(LoaderError::config("psql binary path cannot be empty"));
        }

        if !self.work_dir.is_dir() {
            return Err(LoaderError::config(format!(
                "Work directory '{}' does not exist",
                self.work_dir.display()
            )));
        }

        self.copy_target().map(|_| ())
    }

    /// Table and format every chunk is copied into
    pub fn copy_target(&self) -> Result<CopyTarget> {
        CopyTarget::new(&self.table, self.delimiter)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

/// Builder for [`LoaderConfig`]
#[derive(Debug)]
pub struct LoaderConfigBuilder {
    config: LoaderConfig,
}

impl LoaderConfigBuilder {
    pub fn chunks(mut self, chunks: usize) -> Self {
        self.config.chunks = chunks;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.config.table = table.into();
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.config.delimiter = delimiter;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = url.into();
        self
    }

    pub fn backend(mut self, backend: LoaderBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn psql_bin(mut self, bin: impl Into<PathBuf>) -> Self {
        self.config.psql_bin = bin.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    pub fn build(self) -> LoaderConfig {
        self.config
    }
}
