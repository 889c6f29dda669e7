//! Stdio transport: reads request envelopes from stdin, writes responses to
//! stdout, one JSON object per line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use seo_integrity::{handle, IntegrityConfig, RequestId, Response};

use crate::error::WorkerResult;

use super::framing;

/// Line-oriented worker loop.
pub struct StdioTransport {
    config: IntegrityConfig,
}

impl StdioTransport {
    pub fn new(config: IntegrityConfig) -> Self {
        Self { config }
    }

    /// Serve stdin/stdout until EOF.
    pub async fn run(&self) -> WorkerResult<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        tracing::info!("Stdio worker started");
        let answered = self.serve(stdin, stdout).await?;
        tracing::info!(answered, "EOF on stdin, shutting down");
        Ok(())
    }

    /// Answer every non-blank line read from `reader`; returns how many
    /// responses were written.
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> WorkerResult<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut line = String::new();
        let mut answered = 0;

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match framing::parse_request(trimmed) {
                Ok(request) => handle(&self.config, request),
                Err(e) => {
                    tracing::warn!("Parse error: {e}");
                    Response::error(RequestId::Null, e.to_string())
                }
            };

            let framed = framing::frame_response(&response)?;
            writer.write_all(framed.as_bytes()).await?;
            writer.flush().await?;
            answered += 1;
        }

        Ok(answered)
    }
}
