//! Load outcomes and the end-of-run summary

use crate::chunk::ChunkSpan;
use crate::error::{ChunkError, LoaderError, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    PartiallyFailed,
    Failed,
}

impl RunStatus {
    /// Derive the status from per-chunk results. Zero chunks is a success.
    pub fn from_counts(total: usize, failed: usize) -> Self {
        match failed {
            0 => RunStatus::Succeeded,
            f if f == total => RunStatus::Failed,
            _ => RunStatus::PartiallyFailed,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Succeeded => write!(f, "succeeded"),
            RunStatus::PartiallyFailed => write!(f, "partially failed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What happened to one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    pub span: ChunkSpan,
    pub rows_loaded: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl ChunkOutcome {
    pub fn loaded(span: ChunkSpan, rows_loaded: u64, elapsed: Duration) -> Self {
        Self {
            span,
            rows_loaded,
            elapsed,
            error: None,
        }
    }

    pub fn failed(span: ChunkSpan, error: &ChunkError, elapsed: Duration) -> Self {
        Self {
            span,
            rows_loaded: 0,
            elapsed,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated result of a load run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub run_id: Uuid,
    pub source: PathBuf,
    pub table: String,
    pub started_at: DateTime<Utc>,
    pub status: RunStatus,
    pub rows_loaded: u64,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// Sorted by chunk index
    pub chunks: Vec<ChunkOutcome>,
}

impl LoadReport {
    /// Aggregate worker outcomes collected after the join
    pub fn new(
        run_id: Uuid,
        source: &Path,
        table: &str,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        mut chunks: Vec<ChunkOutcome>,
    ) -> Self {
        chunks.sort_by_key(|c| c.span.index);
        let failed = chunks.iter().filter(|c| !c.is_success()).count();

        Self {
            run_id,
            source: source.to_path_buf(),
            table: table.to_string(),
            started_at,
            status: RunStatus::from_counts(chunks.len(), failed),
            rows_loaded: chunks.iter().map(|c| c.rows_loaded).sum(),
            elapsed,
            chunks,
        }
    }

    pub fn successful(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.chunks.iter().filter(|c| c.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ChunkOutcome> {
        self.chunks.iter().filter(|c| !c.is_success())
    }

    /// Mean load time of the successful chunks
    pub fn average_success_time(&self) -> Option<Duration> {
        let (count, total) = self
            .successful()
            .fold((0u32, Duration::ZERO), |(n, t), c| (n + 1, t + c.elapsed));
        (count > 0).then(|| total / count)
    }

    /// `Err(AllChunksFailed)` when nothing was loaded because every chunk failed
    pub fn check(&self) -> Result<()> {
        match self.status {
            RunStatus::Failed => Err(LoaderError::AllChunksFailed {
                failed: self.chunks.len(),
            }),
            _ => Ok(()),
        }
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| LoaderError::config(format!("Cannot serialize report: {}", e)))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Human-readable end-of-run summary
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(50);
        let failed_count = self.failed().count();

        let _ = writeln!(out, "\n{}", rule);
        let headline = format!(
            "IMPORT {} in {:.2} seconds",
            self.status.to_string().to_uppercase(),
            self.elapsed.as_secs_f64()
        );
        let headline = match self.status {
            RunStatus::Succeeded => headline.green().bold(),
            RunStatus::PartiallyFailed => headline.yellow().bold(),
            RunStatus::Failed => headline.red().bold(),
        };
        let _ = writeln!(out, "{}", headline);
        let _ = writeln!(out, "{}", rule);

        let _ = writeln!(out, "Source: {}", self.source.display());
        let _ = writeln!(out, "Table: {}", self.table);
        let _ = writeln!(out, "Total chunks: {}", self.chunks.len());
        let _ = writeln!(out, "Successful chunks: {}", self.chunks.len() - failed_count);
        let _ = writeln!(out, "Failed chunks: {}", failed_count);
        let _ = writeln!(out, "Rows loaded: {}", self.rows_loaded);
        if let Some(avg) = self.average_success_time() {
            let _ = writeln!(
                out,
                "Average time per successful chunk: {:.2} seconds",
                avg.as_secs_f64()
            );
        }

        if !self.chunks.is_empty() {
            let _ = writeln!(out, "\n{}", self.chunk_table());
        }

        if failed_count > 0 {
            let _ = writeln!(out, "\n{}", "Failed chunks can be re-run by hand:".yellow());
            for chunk in self.failed() {
                let _ = writeln!(
                    out,
                    "  chunk {} ({}): {}",
                    chunk.span.number(),
                    chunk.span,
                    chunk.error.as_deref().unwrap_or("unknown error")
                );
                let _ = writeln!(
                    out,
                    "    sed -n '{},{}p' '{}' > chunk_{}.csv",
                    chunk.span.first_line,
                    chunk.span.last_line(),
                    self.source.display(),
                    chunk.span.number()
                );
            }
        }

        out
    }

    fn chunk_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Chunk", "Lines", "Status", "Rows", "Seconds"]);

        for chunk in &self.chunks {
            let status = if chunk.is_success() { "SUCCESS" } else { "FAILED" };
            table.add_row(vec![
                Cell::new(chunk.span.number()),
                Cell::new(format!("{}-{}", chunk.span.first_line, chunk.span.last_line())),
                Cell::new(status),
                Cell::new(chunk.rows_loaded),
                Cell::new(format!("{:.2}", chunk.elapsed.as_secs_f64())),
            ]);
        }

        table
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
