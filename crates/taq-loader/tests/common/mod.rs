//! Shared helpers for taq-loader integration tests
//!
//! Builds TAQ-shaped source files (header, trades, trailer) and, on unix,
//! stand-in `psql` scripts that record what they were asked to copy.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

pub const TAQ_HEADER: &str = "Time|Exchange|Symbol|Sale Condition|Trade Volume|Trade Price|\
Trade Stop Stock Indicator|Trade Correction Indicator|Sequence Number|Trade Id|\
Source of Trade|Trade Reporting Facility|Participant Timestamp|\
Trade Reporting Facility TRF Timestamp|Trade Through Exempt Indicator";

/// Initialize tracing once for the test binary
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,taq_loader=debug,sqlx=warn")),
        )
        .with_test_writer()
        .try_init();
}

/// One trade record. `seq` makes every line unique.
pub fn trade_line(seq: u64) -> String {
    format!(
        "0930{:011}|N|AAPL|@|{}|185.250000|N|0|{}|{}|C|N|0930{:011}||0",
        seq,
        100 + seq,
        seq,
        seq,
        seq
    )
}

/// Trailer record closing a file of `records` trades
pub fn trailer_line(records: u64) -> String {
    format!("END|20240102|{}", records)
}

/// Write a complete TAQ file with `data_lines` trades and return its path
pub fn write_taq_file(dir: &Path, name: &str, data_lines: u64) -> PathBuf {
    let mut content = String::new();
    content.push_str(TAQ_HEADER);
    content.push('\n');
    for seq in 1..=data_lines {
        content.push_str(&trade_line(seq));
        content.push('\n');
    }
    content.push_str(&trailer_line(data_lines));
    content.push('\n');

    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write TAQ file");
    path
}

/// Write an executable shell script
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}", body)).expect("Failed to write script");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
    path
}

/// A `psql` stand-in that copies each chunk file into `capture_dir` and
/// prints the `COPY <n>` tag real psql prints.
///
/// With `fail_chunk = Some(i)`, the chunk with zero-based index `i` fails
/// with an error on stderr and exit status 1.
#[cfg(unix)]
pub fn fake_psql(dir: &Path, capture_dir: &Path, fail_chunk: Option<usize>) -> PathBuf {
    let fail = match fail_chunk {
        Some(index) => format!(
            "case \"$name\" in\n  taq_chunk_{}_*) echo 'ERROR:  invalid input syntax for type bigint' >&2; exit 1;;\nesac\n",
            index
        ),
        None => String::new(),
    };

    // $6 is the \copy meta-command: \copy <table> FROM '<path>' WITH (...)
    let body = format!(
        r#"path=$(printf '%s' "$6" | sed -n "s/.*FROM '\([^']*\)'.*/\1/p")
name=$(basename "$path")
{fail}cp "$path" "{capture}/$name"
n=$(wc -l < "$path")
echo "COPY $((n))"
"#,
        fail = fail,
        capture = capture_dir.display()
    );

    write_script(dir, "psql", &body)
}

/// Lines of every captured chunk file, in no particular order
pub fn captured_lines(capture_dir: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in fs::read_dir(capture_dir).expect("Failed to read capture dir") {
        let path = entry.expect("Failed to read entry").path();
        let content = fs::read_to_string(&path).expect("Failed to read captured chunk");
        lines.extend(content.lines().map(str::to_string));
    }
    lines
}
