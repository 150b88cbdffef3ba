//! Source file preprocessing
//!
//! A TAQ trade file starts with a header line and ends with a trailer line
//! that is never valid data. Both are dropped by construction: the data
//! lines are source lines `2 ..= total_lines - 1` (1-based) and nothing
//! outside that range is ever copied into a chunk.

use crate::error::{LoaderError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source line number of the first data line (line 1 is the header)
pub const FIRST_DATA_LINE: u64 = 2;

/// Line structure of a scanned source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLayout {
    pub path: PathBuf,
    /// Every line in the file, header and trailer included
    pub total_lines: u64,
    /// Lines that will be loaded
    pub data_lines: u64,
}

impl SourceLayout {
    /// Count the lines of `path`.
    ///
    /// Returns [`LoaderError::SourceNotFound`] when the path is missing or is
    /// not a regular file.
    pub fn scan(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LoaderError::SourceNotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LoaderError::SourceNotFound(path.to_path_buf()),
            _ => LoaderError::Io(e),
        })?;
        let total_lines = count_lines(BufReader::with_capacity(1 << 20, file))?;

        debug!(path = %path.display(), total_lines, "Scanned source file");

        Ok(Self::from_total(path, total_lines))
    }

    /// Layout of a file with `total_lines` lines
    pub fn from_total(path: impl Into<PathBuf>, total_lines: u64) -> Self {
        Self {
            path: path.into(),
            total_lines,
            data_lines: total_lines.saturating_sub(2),
        }
    }

    /// Source line number of the last data line, if there is any data
    pub fn last_data_line(&self) -> Option<u64> {
        (self.data_lines > 0).then(|| self.total_lines - 1)
    }
}

/// Count lines the way `sed` sees them: a final line without a trailing
/// newline still counts, a trailing newline does not open a new line.
pub fn count_lines<R: BufRead>(mut reader: R) -> std::io::Result<u64> {
    let mut lines = 0u64;
    let mut last_byte = None;

    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        last_byte = buf.last().copied();
        let len = buf.len();
        reader.consume(len);
    }

    if matches!(last_byte, Some(b) if b != b'\n') {
        lines += 1;
    }

    Ok(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_count_lines() {
        assert_eq!(count_lines(Cursor::new("")).unwrap(), 0);
        assert_eq!(count_lines(Cursor::new("a")).unwrap(), 1);
        assert_eq!(count_lines(Cursor::new("a\n")).unwrap(), 1);
        assert_eq!(count_lines(Cursor::new("a\nb")).unwrap(), 2);
        assert_eq!(count_lines(Cursor::new("a\nb\n\n")).unwrap(), 3);
    }

    #[test]
    fn test_count_lines_across_buffer_boundaries() {
        let text = "x|y|z\n".repeat(1000);
        let reader = BufReader::with_capacity(7, Cursor::new(text));
        assert_eq!(count_lines(reader).unwrap(), 1000);
    }

    #[test]
    fn test_layout_drops_header_and_trailer() {
        let layout = SourceLayout::from_total("f", 100);
        assert_eq!(layout.data_lines, 98);
        assert_eq!(layout.last_data_line(), Some(99));

        for total in 0..=2 {
            let layout = SourceLayout::from_total("f", total);
            assert_eq!(layout.data_lines, 0);
            assert_eq!(layout.last_data_line(), None);
        }
    }

    #[test]
    fn test_scan_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Time|Exchange|Symbol\n1|P|A\n2|P|B\nEND|2\n").unwrap();

        let layout = SourceLayout::scan(file.path()).unwrap();
        assert_eq!(layout.total_lines, 4);
        assert_eq!(layout.data_lines, 2);
    }

    #[test]
    fn test_scan_missing_file() {
        let err = SourceLayout::scan("/no/such/taq_file.txt").unwrap_err();
        assert!(matches!(err, LoaderError::SourceNotFound(_)));
    }

    #[test]
    fn test_scan_directory_is_not_a_source() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SourceLayout::scan(dir.path()),
            Err(LoaderError::SourceNotFound(_))
        ));
    }
}
