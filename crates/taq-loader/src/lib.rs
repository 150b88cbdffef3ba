//! TAQ Import Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Loads large pipe-delimited TAQ trade files into PostgreSQL by splitting
//! them into chunks and copying the chunks in parallel.
//!
//! # Overview
//!
//! - **Preprocessing** ([`source`]): count lines; the header and trailer are
//!   never loaded
//! - **Chunking** ([`chunk`]): contiguous, evenly sized spans written to
//!   temporary files
//! - **Bulk copy** ([`copy`]): `COPY FROM STDIN` through sqlx, or `psql \copy`
//! - **Orchestration** ([`loader`]): one task per chunk, outcomes aggregated
//!   into a [`report::LoadReport`]
//!
//! # Example
//!
//! ```no_run
//! use taq_loader::{ChunkedLoader, LoaderConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = LoaderConfig::builder("/data/EQY_US_ALL_TRADE_20240102")
//!         .chunks(8)
//!         .database_url("postgres://localhost/markets")
//!         .build();
//!
//!     let mut loader = ChunkedLoader::from_config(config)?;
//!     let report = loader.run().await?;
//!     println!("{}", report.render_summary());
//!     report.check()?;
//!     Ok(())
//! }
//! ```

pub mod chunk;
pub mod config;
pub mod copy;
pub mod error;
pub mod exit_code;
pub mod loader;
pub mod progress;
pub mod report;
pub mod schema;
pub mod source;

// Re-export commonly used types
pub use config::{LoaderBackend, LoaderConfig};
pub use error::{ChunkError, CopyError, LoaderError, Result};
pub use loader::{ChunkPlan, ChunkedLoader, LoadPhase};
pub use report::{ChunkOutcome, LoadReport, RunStatus};

use clap::Parser;
use std::path::PathBuf;

/// taq-import - load TAQ trade files into PostgreSQL in parallel chunks
#[derive(Parser, Debug)]
#[command(name = "taq-import")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TAQ trade data file to import
    #[arg(short, long)]
    pub file: PathBuf,

    /// Number of chunks to split the file into; also the number of parallel loads
    #[arg(short, long, env = "TAQ_CHUNKS", default_value_t = config::DEFAULT_CHUNKS)]
    pub chunks: usize,

    /// Destination table ([schema.]table)
    #[arg(short, long, env = "TAQ_TABLE", default_value = config::DEFAULT_TABLE)]
    pub table: String,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", default_value = config::DEFAULT_DATABASE_URL, hide_env_values = true)]
    pub database_url: String,

    /// Column delimiter of the source file
    #[arg(long, default_value_t = config::DEFAULT_DELIMITER)]
    pub delimiter: char,

    /// Bulk-copy backend
    #[arg(long, value_enum, env = "TAQ_LOADER", default_value_t = LoaderBackend::Native)]
    pub loader: LoaderBackend,

    /// psql binary used by the psql backend
    #[arg(long, env = "PSQL_BIN", default_value = "psql")]
    pub psql_bin: PathBuf,

    /// Directory for temporary chunk files (defaults to the system temp dir)
    #[arg(long, env = "TAQ_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// Create the destination table before loading
    #[arg(long)]
    pub init_schema: bool,

    /// Print the chunk plan and exit without loading
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when some chunks fail
    #[arg(long)]
    pub fail_on_partial: bool,

    /// Write the load report as JSON to this path
    #[arg(long)]
    pub report_json: Option<PathBuf>,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Loader configuration described by these flags
    pub fn loader_config(&self) -> LoaderConfig {
        let mut builder = LoaderConfig::builder(&self.file)
            .chunks(self.chunks)
            .table(&self.table)
            .delimiter(self.delimiter)
            .database_url(&self.database_url)
            .backend(self.loader)
            .psql_bin(&self.psql_bin)
            .show_progress(!self.no_progress);

        if let Some(ref dir) = self.work_dir {
            builder = builder.work_dir(dir);
        }

        builder.build()
    }
}
