//! Chunked parallel loader
//!
//! A run moves through `Pending → Chunking → Loading` and ends in one of
//! `Succeeded`, `PartiallyFailed` or `Failed`. Every chunk is loaded by its
//! own task; tasks share nothing and each hands back a [`ChunkOutcome`] that
//! the coordinator aggregates after all of them have been joined.

use crate::chunk::{materialize_chunks, plan_chunks, ChunkSpan, PreparedChunk};
use crate::config::LoaderConfig;
use crate::copy::{backend_for, BulkCopy, CopyTarget};
use crate::error::{ChunkError, LoaderError, Result};
use crate::progress;
use crate::report::{ChunkOutcome, LoadReport, RunStatus};
use crate::source::SourceLayout;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Lifecycle phase of a [`ChunkedLoader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    Pending,
    Chunking,
    Loading,
    Succeeded,
    PartiallyFailed,
    Failed,
}

impl LoadPhase {
    pub fn can_advance_to(self, next: LoadPhase) -> bool {
        use LoadPhase::*;
        matches!(
            (self, next),
            (Pending, Chunking)
                | (Chunking, Loading)
                | (Loading, Succeeded)
                | (Loading, PartiallyFailed)
                | (Loading, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoadPhase::Succeeded | LoadPhase::PartiallyFailed | LoadPhase::Failed
        )
    }
}

impl From<RunStatus> for LoadPhase {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Succeeded => LoadPhase::Succeeded,
            RunStatus::PartiallyFailed => LoadPhase::PartiallyFailed,
            RunStatus::Failed => LoadPhase::Failed,
        }
    }
}

/// Source layout plus the spans it will be split into
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPlan {
    pub layout: SourceLayout,
    pub requested_chunks: usize,
    pub spans: Vec<ChunkSpan>,
}

/// Splits a source file into chunks and loads them concurrently
pub struct ChunkedLoader {
    config: LoaderConfig,
    target: CopyTarget,
    copier: Arc<dyn BulkCopy>,
    run_id: Uuid,
    phase: LoadPhase,
}

impl ChunkedLoader {
    /// Loader using the backend selected in `config`
    pub fn from_config(config: LoaderConfig) -> Result<Self> {
        let copier = backend_for(&config);
        Self::new(config, copier)
    }

    /// Loader with an explicit bulk-copy backend
    pub fn new(config: LoaderConfig, copier: Arc<dyn BulkCopy>) -> Result<Self> {
        config.validate()?;
        let target = config.copy_target()?;

        Ok(Self {
            config,
            target,
            copier,
            run_id: Uuid::new_v4(),
            phase: LoadPhase::Pending,
        })
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn advance(&mut self, next: LoadPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(LoaderError::InvalidTransition {
                from: format!("{:?}", self.phase),
                to: format!("{:?}", next),
            });
        }
        info!(run_id = %self.run_id, from = ?self.phase, to = ?next, "Loader phase change");
        self.phase = next;
        Ok(())
    }

    /// Scan the source and compute chunk spans without writing anything
    pub async fn plan(&self) -> Result<ChunkPlan> {
        let source = self.config.source.clone();
        let requested = self.config.chunks;

        let layout = blocking(move || SourceLayout::scan(&source)).await?;
        let spans = plan_chunks(layout.data_lines, requested);

        if spans.len() < requested && layout.data_lines > 0 {
            warn!(
                requested,
                data_lines = layout.data_lines,
                "Fewer data lines than requested chunks; using one chunk per line"
            );
        }

        Ok(ChunkPlan {
            layout,
            requested_chunks: requested,
            spans,
        })
    }

    /// Run the whole load and return its report.
    ///
    /// Returns `Err` only for run-level failures (missing source, unreadable
    /// source, misuse). Chunk failures are recorded in the report; use
    /// [`LoadReport::check`] to turn an all-failed run into an error.
    pub async fn run(&mut self) -> Result<LoadReport> {
        if self.phase != LoadPhase::Pending {
            return Err(LoaderError::InvalidTransition {
                from: format!("{:?}", self.phase),
                to: format!("{:?}", LoadPhase::Chunking),
            });
        }

        let started_at = Utc::now();
        let clock = Instant::now();

        info!(
            run_id = %self.run_id,
            source = %self.config.source.display(),
            table = self.target.table(),
            chunks = self.config.chunks,
            backend = self.copier.name(),
            "Starting TAQ import"
        );

        let plan = self.plan().await?;
        info!(
            total_lines = plan.layout.total_lines,
            data_lines = plan.layout.data_lines,
            chunks = plan.spans.len(),
            "Source scanned, header and trailer excluded"
        );

        self.advance(LoadPhase::Chunking)?;
        let work_dir = self.config.work_dir().to_path_buf();
        let layout = plan.layout.clone();
        let spans = plan.spans.clone();
        let prepared =
            blocking(move || materialize_chunks(&layout, &spans, &work_dir)).await?;

        self.advance(LoadPhase::Loading)?;
        if prepared.is_empty() {
            warn!("Source has no data lines; nothing to load");
        }
        let outcomes = self.load_all(prepared).await;

        let report = LoadReport::new(
            self.run_id,
            &self.config.source,
            self.target.table(),
            started_at,
            clock.elapsed(),
            outcomes,
        );
        self.advance(report.status.into())?;

        info!(
            run_id = %self.run_id,
            status = %report.status,
            rows = report.rows_loaded,
            failed_chunks = report.failed().count(),
            elapsed_secs = report.elapsed.as_secs_f64(),
            "TAQ import finished"
        );

        Ok(report)
    }

    /// Fan out one task per chunk and fan the outcomes back in
    async fn load_all(&self, prepared: Vec<PreparedChunk>) -> Vec<ChunkOutcome> {
        let total = prepared.len();
        let concurrency = total.max(1);
        let pb = progress::chunk_progress(total, self.config.show_progress);

        let outcomes: Vec<ChunkOutcome> = stream::iter(prepared)
            .map(|chunk| {
                let copier = Arc::clone(&self.copier);
                let target = self.target.clone();
                let span = chunk.span();
                let pb = pb.clone();

                async move {
                    let started = Instant::now();
                    match tokio::spawn(load_chunk(copier, target, chunk, pb, total)).await {
                        Ok(outcome) => outcome,
                        Err(join_err) => {
                            let err = ChunkError::WorkerPanicked(join_err.to_string());
                            ChunkOutcome::failed(span, &err, started.elapsed())
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .inspect(|outcome| record_finished(&pb, outcome, total))
            .collect()
            .await;

        pb.finish_and_clear();
        outcomes
    }
}

/// Count a finished chunk on the bar and log it.
///
/// The bar and the console log share stderr, so the event is written with
/// the bar suspended.
fn record_finished(pb: &ProgressBar, outcome: &ChunkOutcome, total: usize) {
    let span = outcome.span;
    pb.suspend(|| match outcome.error {
        None => info!(
            chunk = span.number(),
            total,
            lines = %span,
            rows = outcome.rows_loaded,
            elapsed_secs = outcome.elapsed.as_secs_f64(),
            "Chunk loaded"
        ),
        Some(ref err) => error!(
            chunk = span.number(),
            total,
            lines = %span,
            elapsed_secs = outcome.elapsed.as_secs_f64(),
            error = %err,
            "Chunk load failed"
        ),
    });

    pb.inc(1);
    if !outcome.is_success() {
        pb.set_message(format!("(chunk {} failed)", span.number()));
    }
}

/// Load a single chunk. The chunk file is deleted when `chunk` is dropped at
/// the end of this function, after the outcome has been built.
async fn load_chunk(
    copier: Arc<dyn BulkCopy>,
    target: CopyTarget,
    chunk: PreparedChunk,
    pb: ProgressBar,
    total: usize,
) -> ChunkOutcome {
    let chunk = match chunk {
        PreparedChunk::Ready(chunk) => chunk,
        PreparedChunk::WriteFailed { span, error } => {
            debug!(chunk = span.number(), total, lines = %span, "Chunk was never written");
            return ChunkOutcome::failed(span, &error, Duration::ZERO);
        }
    };

    let span = chunk.span;
    pb.suspend(|| {
        info!(chunk = span.number(), total, lines = %span, backend = copier.name(), "Starting chunk load")
    });

    let started = Instant::now();
    let result = copier.copy_file(&target, chunk.path()).await;
    let elapsed = started.elapsed();

    match result {
        Ok(rows) => ChunkOutcome::loaded(span, rows.unwrap_or(span.line_count), elapsed),
        Err(e) => {
            let err = ChunkError::from(e);
            debug!(chunk = span.number(), total, error = %err, "Bulk copy returned an error");
            ChunkOutcome::failed(span, &err, elapsed)
        }
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LoaderError::Io(std::io::Error::other(e)))?
}
