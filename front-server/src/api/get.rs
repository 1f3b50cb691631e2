use std::sync::Arc;

use anyhow::anyhow;
use axum::body::StreamBody;
use axum::extract::{Extension, Query};
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use tracing::instrument;

use common::FileId;

use crate::download::DownloadService;
use crate::error::{ErrorKind, ServerResult};
use crate::State;

#[derive(Deserialize)]
pub struct GetParams {
    uuid: String,
}

/// Streams a file back as the ordered concatenation of its shards.
///
/// `GET /get?uuid=<id>`
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub async fn get_file(
    Extension(state): Extension<Arc<State>>,
    Query(params): Query<GetParams>,
) -> ServerResult<Response> {
    let file_id = FileId::new(params.uuid).map_err(ErrorKind::RequestError)?;

    let servers = state
        .allocation_map()
        .get(&file_id)
        .ok_or(ErrorKind::NotFound)?;

    let download_service = DownloadService::new(state.http_client.clone());
    let (size, stream) = download_service
        .fetch_chunks(&file_id, &servers)
        .await
        .map_err(ErrorKind::DownloadError)?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_DISPOSITION, "attachment")
        .body(axum::body::boxed(StreamBody::new(stream)))
        .map_err(|e| ErrorKind::DownloadError(anyhow!(e)))?;

    Ok(response)
}
