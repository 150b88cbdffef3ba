//! Chunk planning and materialization
//!
//! Data lines are split into contiguous spans whose sizes differ by at most
//! one line. The first `n % k` chunks carry the extra line. When there are
//! fewer data lines than requested chunks the chunk count shrinks to the
//! number of lines, so no chunk is ever empty.

use crate::error::{ChunkError, LoaderError, Result};
use crate::source::{SourceLayout, FIRST_DATA_LINE};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// A contiguous range of source lines assigned to one worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpan {
    /// Zero-based chunk index
    pub index: usize,
    /// 1-based source line number of the first line in the chunk
    pub first_line: u64,
    /// Number of lines in the chunk (never zero)
    pub line_count: u64,
}

impl ChunkSpan {
    /// 1-based source line number of the last line in the chunk
    pub fn last_line(&self) -> u64 {
        self.first_line + self.line_count - 1
    }

    /// Human-facing chunk number (1-based)
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

impl std::fmt::Display for ChunkSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lines {}-{}", self.first_line, self.last_line())
    }
}

/// Split `data_lines` lines into at most `requested` contiguous spans
pub fn plan_chunks(data_lines: u64, requested: usize) -> Vec<ChunkSpan> {
    let count = (requested as u64).min(data_lines);
    if count == 0 {
        return Vec::new();
    }

    let base = data_lines / count;
    let remainder = data_lines % count;
    let mut next_line = FIRST_DATA_LINE;

    (0..count)
        .map(|i| {
            let line_count = base + u64::from(i < remainder);
            let span = ChunkSpan {
                index: i as usize,
                first_line: next_line,
                line_count,
            };
            next_line += line_count;
            span
        })
        .collect()
}

/// A chunk written to its own temporary file. The file is deleted when this
/// value is dropped.
#[derive(Debug)]
pub struct MaterializedChunk {
    pub span: ChunkSpan,
    file: NamedTempFile,
}

impl MaterializedChunk {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Result of materializing one planned span
#[derive(Debug)]
pub enum PreparedChunk {
    Ready(MaterializedChunk),
    WriteFailed { span: ChunkSpan, error: ChunkError },
}

impl PreparedChunk {
    pub fn span(&self) -> ChunkSpan {
        match self {
            PreparedChunk::Ready(chunk) => chunk.span,
            PreparedChunk::WriteFailed { span, .. } => *span,
        }
    }
}

/// Write every span of `layout` into its own temporary file in `work_dir`.
///
/// The source is streamed once. A chunk whose file cannot be created or
/// written is returned as [`PreparedChunk::WriteFailed`] and the remaining
/// chunks are still written. Errors reading the source are fatal.
pub fn materialize_chunks(
    layout: &SourceLayout,
    spans: &[ChunkSpan],
    work_dir: &Path,
) -> Result<Vec<PreparedChunk>> {
    let mut prepared = Vec::with_capacity(spans.len());
    if spans.is_empty() {
        return Ok(prepared);
    }

    let file = File::open(&layout.path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoaderError::SourceNotFound(layout.path.clone()),
        _ => LoaderError::Io(e),
    })?;
    let mut reader = BufReader::with_capacity(1 << 20, file);
    let mut line = Vec::with_capacity(256);

    // header
    reader.read_until(b'\n', &mut line)?;

    for span in spans {
        let mut chunk_file = match create_chunk_file(work_dir, span) {
            Ok(file) => file,
            Err(e) => {
                warn!(chunk = span.number(), error = %e, "Could not create chunk file");
                prepared.push(PreparedChunk::WriteFailed {
                    span: *span,
                    error: ChunkError::ChunkWriteFailure(e.to_string()),
                });
                skip_span(&mut reader, span, &mut line)?;
                continue;
            }
        };

        match copy_span(&mut reader, span, &mut chunk_file, &mut line)? {
            None => {
                debug!(chunk = span.number(), path = %chunk_file.path().display(), %span, "Chunk file written");
                prepared.push(PreparedChunk::Ready(MaterializedChunk {
                    span: *span,
                    file: chunk_file,
                }));
            }
            Some(e) => {
                warn!(chunk = span.number(), error = %e, "Could not write chunk file");
                prepared.push(PreparedChunk::WriteFailed {
                    span: *span,
                    error: ChunkError::ChunkWriteFailure(e.to_string()),
                });
            }
        }
    }

    Ok(prepared)
}

fn create_chunk_file(work_dir: &Path, span: &ChunkSpan) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(&format!("taq_chunk_{}_", span.index))
        .suffix(".csv")
        .tempfile_in(work_dir)
}

/// Copy the lines of `span` from `reader` into `dest`.
///
/// Returns `Ok(Some(err))` when writing failed; the span is still consumed
/// from the reader so later chunks stay aligned.
fn copy_span<R: BufRead>(
    reader: &mut R,
    span: &ChunkSpan,
    dest: &mut NamedTempFile,
    line: &mut Vec<u8>,
) -> Result<Option<std::io::Error>> {
    let mut writer = Some(BufWriter::with_capacity(1 << 16, dest));
    let mut write_error = None;

    for _ in 0..span.line_count {
        read_source_line(reader, line)?;
        if !line.ends_with(b"\n") {
            line.push(b'\n');
        }
        if let Some(w) = writer.as_mut() {
            if let Err(e) = w.write_all(line) {
                write_error = Some(e);
                writer = None;
            }
        }
    }

    if let Some(mut w) = writer {
        if let Err(e) = w.flush() {
            write_error = Some(e);
        }
    }

    Ok(write_error)
}

fn skip_span<R: BufRead>(reader: &mut R, span: &ChunkSpan, line: &mut Vec<u8>) -> Result<()> {
    for _ in 0..span.line_count {
        read_source_line(reader, line)?;
    }
    Ok(())
}

fn read_source_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> Result<()> {
    line.clear();
    if reader.read_until(b'\n', line)? == 0 {
        return Err(LoaderError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "source file shrank while chunking",
        )));
    }
    Ok(())
}
