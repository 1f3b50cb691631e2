//! Download pipeline: parallel shard fetches reassembled in index order.

use std::io;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::Stream;
use futures::StreamExt;
use reqwest::StatusCode;
use tokio::sync::{mpsc, oneshot};
use tracing::instrument;

use common::FileId;

use crate::registry::ChunkServer;

/// Frames buffered per shard pipe before its fetcher blocks.
const PIPE_CAPACITY: usize = 16;

/// One ordered shard pipe: the fetcher reports the shard size once, then
/// streams body frames until EOF or error.
struct ShardPipe {
    size_rx: oneshot::Receiver<Result<u64>>,
    data_rx: mpsc::Receiver<io::Result<Bytes>>,
}

/// Drives the shard fetches of one download.
pub struct DownloadService {
    http_client: reqwest::Client,
}

impl DownloadService {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Starts one fetcher per shard and returns the reassembled payload.
    ///
    /// The returned size is the sum of the shard Content-Lengths, known
    /// before the first body byte is produced. The stream yields the
    /// shards strictly in index order while the fetchers run in parallel,
    /// each buffering at most a few frames ahead of the reader.
    #[instrument(skip_all, fields(file_id = %file_id))]
    pub async fn fetch_chunks(
        &self,
        file_id: &FileId,
        servers: &[Arc<ChunkServer>],
    ) -> Result<(u64, impl Stream<Item = io::Result<Bytes>>)> {
        let mut pipes = Vec::with_capacity(servers.len());
        for (index, server) in servers.iter().enumerate() {
            let (size_tx, size_rx) = oneshot::channel();
            let (data_tx, data_rx) = mpsc::channel(PIPE_CAPACITY);
            let url = format!("{}/get?uuid={}", server.address(), file_id);

            tokio::spawn(fetch_chunk(
                self.http_client.clone(),
                url,
                index,
                size_tx,
                data_tx,
            ));
            pipes.push(ShardPipe { size_rx, data_rx });
        }

        let mut total = 0u64;
        for pipe in &mut pipes {
            let size = (&mut pipe.size_rx)
                .await
                .map_err(|_| anyhow!("shard fetcher exited before reporting a size"))??;
            total += size;
        }

        let stream = try_stream! {
            for mut pipe in pipes {
                while let Some(frame) = pipe.data_rx.recv().await {
                    yield frame?;
                }
            }
        };

        Ok((total, stream))
    }
}

/// Streams one shard from its chunk server into its pipe.
///
/// Dropping the sender closes the pipe; an error is forwarded as the
/// final frame so the reader observes it when it reaches this shard.
async fn fetch_chunk(
    client: reqwest::Client,
    url: String,
    index: usize,
    size_tx: oneshot::Sender<Result<u64>>,
    data_tx: mpsc::Sender<io::Result<Bytes>>,
) {
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(error) => {
            tracing::error!(chunk = index, %error, "Failed to send GET request");
            let _ = size_tx.send(Err(anyhow!(error).context("failed to send GET request")));
            return;
        }
    };

    if response.status() != StatusCode::OK {
        let _ = size_tx.send(Err(anyhow!(
            "received non-OK HTTP status: {}",
            response.status()
        )));
        return;
    }

    let size = match response.content_length() {
        Some(size) => size,
        None => {
            let _ = size_tx.send(Err(anyhow!("chunk server response has no Content-Length")));
            return;
        }
    };
    if size_tx.send(Ok(size)).is_err() {
        return;
    }

    let mut body = response.bytes_stream();
    while let Some(frame) = body.next().await {
        let frame = frame.map_err(|error| {
            tracing::error!(chunk = index, %error, "Failed to read chunk body");
            io::Error::new(io::ErrorKind::Other, error)
        });
        let failed = frame.is_err();

        if data_tx.send(frame).await.is_err() {
            // The reader is gone; the download was abandoned.
            return;
        }
        if failed {
            return;
        }
    }
}
