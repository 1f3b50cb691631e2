use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::{Extension, Multipart};
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use tracing::instrument;

use common::FileId;

use crate::chunker;
use crate::error::{ErrorKind, ServerError, ServerResult};
use crate::upload::UploadService;
use crate::State;

#[derive(Serialize)]
pub struct PutResponse {
    uuid: FileId,
}

/// Uploads a file, dispersing its shards across chunk servers.
///
/// `PUT /put` with a multipart `file` field.
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub async fn put_file(
    Extension(state): Extension<Arc<State>>,
    mut multipart: Multipart,
) -> ServerResult<Json<PutResponse>> {
    let mut payload: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ServerError::request_error)?
    {
        if field.name() == Some("file") {
            payload = Some(field.bytes().await.map_err(ServerError::request_error)?);
        }
    }
    let payload = payload.ok_or_else(|| ErrorKind::RequestError(anyhow!("no file field in form")))?;

    let file_id = FileId::generate();
    let file_size = payload.len() as i64;
    let num_parts = state.config.num_parts;
    tracing::info!(file_id = %file_id, file_size, "File uploading");

    let offsets = chunker::chunk_offsets(file_size, num_parts);
    let servers = state
        .registry()
        .select_underloaded(num_parts)
        .ok_or(ErrorKind::NotEnoughServers)?;

    let chunks = chunker::build_chunks(file_size, &offsets, &servers);
    let upload_service = UploadService::new(state.http_client.clone());

    if let Err(error) = upload_service
        .process_chunks(&payload, &file_id, &chunks)
        .await
    {
        // Clean up whatever landed. Servers that never stored their shard
        // answer 404 here; that is logged and swallowed.
        upload_service.delete_chunks(&file_id, &chunks).await;
        return Err(ErrorKind::UploadError(error).into());
    }

    state.allocation_map().add(file_id.clone(), servers.clone());

    let sizes: Vec<i64> = (0..servers.len())
        .map(|i| chunker::chunk_size_at(file_size, &offsets, i))
        .collect();
    state.registry().adjust_sizes(&servers, &sizes, file_size);

    Ok(Json(PutResponse { uuid: file_id }))
}
