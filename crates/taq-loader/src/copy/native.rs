//! COPY FROM STDIN over a dedicated sqlx connection

use super::{BulkCopy, CopyTarget};
use crate::error::CopyError;
use async_trait::async_trait;
use sqlx::{Connection, PgConnection};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

const SEND_BUFFER_BYTES: usize = 64 * 1024;

/// Streams chunk files to the server with the COPY sub-protocol
#[derive(Debug, Clone)]
pub struct PgCopy {
    database_url: String,
}

impl PgCopy {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }
}

#[async_trait]
impl BulkCopy for PgCopy {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn copy_file(&self, target: &CopyTarget, path: &Path) -> Result<Option<u64>, CopyError> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut conn = PgConnection::connect(&self.database_url).await?;
        let mut copy = conn.copy_in_raw(&target.copy_from_stdin()).await?;

        let mut buf = vec![0u8; SEND_BUFFER_BYTES];
        let mut sent = 0u64;
        loop {
            let n = match file.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    if let Err(abort_err) = copy.abort(e.to_string()).await {
                        debug!(error = %abort_err, "COPY abort reported an error");
                    }
                    return Err(CopyError::Io(e));
                }
            };
            copy.send(&buf[..n]).await?;
            sent += n as u64;
        }

        let rows = copy.finish().await?;
        debug!(path = %path.display(), bytes = sent, rows, "COPY finished");

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Closing COPY connection failed");
        }

        Ok(Some(rows))
    }
}
