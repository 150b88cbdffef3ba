//! Error types for the chunked loader
//!
//! Errors are split by blast radius: [`LoaderError`] ends the whole run,
//! [`ChunkError`] only marks one chunk as failed, and [`CopyError`] is what a
//! bulk-copy backend reports before it is attached to a chunk.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Fatal, run-level errors
#[derive(Error, Debug)]
pub enum LoaderError {
    /// Source file is missing; nothing was chunked
    #[error("Source file not found: '{}'. Verify the path exists and is readable.", .0.display())]
    SourceNotFound(PathBuf),

    /// Loader configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading the source file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema migrations failed
    #[error("Migration failed: {0}. Check DATABASE_URL and that the role may create tables.")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Database connection for schema setup failed
    #[error("Database error: {0}. Check your database connection settings.")]
    Database(#[from] sqlx::Error),

    /// A loader was driven through an impossible phase change, e.g. run twice
    #[error("Invalid loader state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Every chunk failed to load
    #[error("All {failed} chunk(s) failed to load")]
    AllChunksFailed { failed: usize },
}

impl LoaderError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failure of a single chunk. Siblings keep running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkError {
    /// The chunk's temporary file could not be created or written
    #[error("failed to write chunk file: {0}")]
    ChunkWriteFailure(String),

    /// The bulk-copy command rejected the chunk
    #[error("load command failed: {message}")]
    LoadCommandFailure { message: String },

    /// The worker task panicked before reporting an outcome
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

impl From<CopyError> for ChunkError {
    fn from(err: CopyError) -> Self {
        ChunkError::LoadCommandFailure {
            message: err.to_string(),
        }
    }
}

/// Errors raised by a bulk-copy backend
#[derive(Error, Debug)]
pub enum CopyError {
    /// The client binary could not be started
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The client exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The server rejected the COPY or the connection
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    /// Reading the chunk file failed
    #[error("reading chunk file: {0}")]
    Io(#[from] std::io::Error),
}
