//! Upload pipeline: parallel ranged PUTs with retries and compensating
//! deletes.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use backoff::ExponentialBackoff;
use bytes::Bytes;
use futures::future::{join_all, try_join_all};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tracing::instrument;

use common::FileId;

use crate::chunker::Chunk;
use crate::registry::ChunkServer;
use crate::CHUNK_SERVER_TIMEOUT;

/// Retry budget for a single request to a chunk server.
const MAX_RETRIES: usize = 5;

/// Drives the shard transfers of one upload.
pub struct UploadService {
    http_client: reqwest::Client,
}

impl UploadService {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Transfers every shard of the plan in parallel.
    ///
    /// The first shard to fail its retry budget cancels the remaining
    /// transfers; the caller is expected to issue compensating deletes.
    #[instrument(skip_all, fields(file_id = %file_id))]
    pub async fn process_chunks(
        &self,
        payload: &Bytes,
        file_id: &FileId,
        chunks: &[Chunk],
    ) -> Result<()> {
        try_join_all(
            chunks
                .iter()
                .map(|chunk| self.process_chunk(payload, file_id, chunk)),
        )
        .await?;

        Ok(())
    }

    async fn process_chunk(&self, payload: &Bytes, file_id: &FileId, chunk: &Chunk) -> Result<()> {
        tracing::info!(
            chunk = chunk.index,
            server = chunk.server.address(),
            start_offset = chunk.start_offset,
            chunk_size = chunk.size,
            "Processing chunk"
        );

        let start = chunk.start_offset as usize;
        let section = payload.slice(start..start + chunk.size as usize);
        let url = format!("{}/put", chunk.server.address());

        retry_request("PUT", || {
            let form = Form::new()
                .text("uuid", file_id.to_string())
                .part("file", Part::stream(section.clone()).file_name("file"));
            let request = self.http_client.put(&url).multipart(form);

            async move {
                let response = request.send().await.context("failed to send PUT request")?;
                if response.status() != StatusCode::OK {
                    bail!("received non-OK HTTP status: {}", response.status());
                }
                Ok(())
            }
        })
        .await
        .with_context(|| format!("chunk {} to {}", chunk.index, chunk.server.address()))
    }

    /// Attempts a compensating delete at every server of the plan.
    ///
    /// Servers whose PUT never landed answer 404 here; such failures are
    /// logged and swallowed.
    #[instrument(skip_all, fields(file_id = %file_id))]
    pub async fn delete_chunks(&self, file_id: &FileId, chunks: &[Chunk]) {
        let results = join_all(
            chunks
                .iter()
                .map(|chunk| self.delete_chunk(file_id, &chunk.server)),
        )
        .await;

        for (chunk, result) in chunks.iter().zip(results) {
            if let Err(error) = result {
                tracing::warn!(
                    server = chunk.server.address(),
                    %error,
                    "Failed to delete chunk"
                );
            }
        }
    }

    async fn delete_chunk(&self, file_id: &FileId, server: &Arc<ChunkServer>) -> Result<()> {
        let url = format!("{}/delete?uuid={}", server.address(), file_id);

        retry_request("DELETE", || {
            let request = self.http_client.delete(&url);

            async move {
                let response = request
                    .send()
                    .await
                    .context("failed to send DELETE request")?;
                if response.status() != StatusCode::OK {
                    bail!("received non-OK HTTP status: {}", response.status());
                }
                Ok(())
            }
        })
        .await
    }
}

/// Runs one request under exponential backoff, capped at [`MAX_RETRIES`]
/// retries and the chunk server deadline.
async fn retry_request<F, Fut>(method: &'static str, op: F) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let attempt = AtomicUsize::new(0);
    let retried = backoff::future::retry(request_backoff(), || {
        let n = attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let fut = op();

        async move {
            fut.await.map_err(|error| {
                tracing::error!(attempt = n, method, %error, "Request to chunk server failed");
                if n > MAX_RETRIES {
                    backoff::Error::permanent(error)
                } else {
                    backoff::Error::transient(error)
                }
            })
        }
    });

    match tokio::time::timeout(CHUNK_SERVER_TIMEOUT, retried).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "{method} request gave up after {}s",
            CHUNK_SERVER_TIMEOUT.as_secs()
        )),
    }
}

fn request_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        max_elapsed_time: Some(CHUNK_SERVER_TIMEOUT),
        ..ExponentialBackoff::default()
    }
}
