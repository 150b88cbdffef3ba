//! `psql \copy` backend
//!
//! One `psql` process per chunk. The file is read client-side by psql, so the
//! server never needs access to the chunk directory.

use super::{BulkCopy, CopyTarget};
use crate::error::CopyError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Runs `psql -c "\copy ..."` against a connection string
#[derive(Debug, Clone)]
pub struct PsqlCopy {
    program: PathBuf,
    connection: String,
}

impl PsqlCopy {
    pub fn new(program: impl Into<PathBuf>, connection: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            connection: connection.into(),
        }
    }

    fn command(&self, target: &CopyTarget, path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-X")
            .arg("-w")
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .arg("-c")
            .arg(target.psql_meta_command(path))
            .arg(&self.connection)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

#[async_trait]
impl BulkCopy for PsqlCopy {
    fn name(&self) -> &'static str {
        "psql"
    }

    async fn copy_file(&self, target: &CopyTarget, path: &Path) -> Result<Option<u64>, CopyError> {
        let program = self.program.display().to_string();
        debug!(program = %program, path = %path.display(), "Spawning psql");

        let output = self
            .command(target, path)
            .output()
            .await
            .map_err(|source| CopyError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CopyError::CommandFailed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_copy_tag(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Extract the row count from psql's `COPY <n>` command tag
pub fn parse_copy_tag(stdout: &str) -> Option<u64> {
    stdout
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix("COPY ")?.trim().parse().ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_copy_tag() {
        assert_eq!(parse_copy_tag("COPY 12\n"), Some(12));
        assert_eq!(parse_copy_tag("SET\nCOPY 0\n"), Some(0));
        assert_eq!(parse_copy_tag("  COPY 98  "), Some(98));
        assert_eq!(parse_copy_tag(""), None);
        assert_eq!(parse_copy_tag("COPY lots"), None);
        assert_eq!(parse_copy_tag("INSERT 0 1"), None);
    }

    #[test]
    fn test_command_arguments() {
        let psql = PsqlCopy::new("/usr/bin/psql", "postgres://localhost/taq");
        let target = CopyTarget::new("taq_trades", '|').unwrap();
        let cmd = psql.command(&target, Path::new("/tmp/taq_chunk_0.csv"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(cmd.as_std().get_program(), "/usr/bin/psql");
        assert_eq!(
            args,
            vec![
                "-X",
                "-w",
                "-v",
                "ON_ERROR_STOP=1",
                "-c",
                "\\copy taq_trades FROM '/tmp/taq_chunk_0.csv' WITH (FORMAT csv, DELIMITER '|')",
                "postgres://localhost/taq",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let psql = PsqlCopy::new("/no/such/psql-binary", "postgres:///postgres");
        let target = CopyTarget::new("taq_trades", '|').unwrap();
        let err = psql
            .copy_file(&target, Path::new("/tmp/whatever.csv"))
            .await
            .unwrap_err();
        assert!(matches!(err, CopyError::Spawn { .. }));
    }
}
