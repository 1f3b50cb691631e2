use std::sync::Arc;

use anyhow::anyhow;
use axum::body::StreamBody;
use axum::extract::{Extension, Query};
use axum::http::{header, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::instrument;

use common::FileId;

use crate::error::{ErrorKind, ServerResult};
use crate::State;

#[derive(Deserialize)]
pub struct GetParams {
    uuid: String,
}

/// Serves a shard's raw bytes.
///
/// `GET /get?uuid=<id>`
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub async fn get_chunk(
    Extension(state): Extension<Arc<State>>,
    Query(params): Query<GetParams>,
) -> ServerResult<Response> {
    let file_id = FileId::new(params.uuid).map_err(ErrorKind::RequestError)?;

    let (file, size) = state.storage().open(&file_id).await?;

    let stream = ReaderStream::new(file);
    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, size)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .body(axum::body::boxed(StreamBody::new(stream)))
        .map_err(|e| ErrorKind::StorageError(anyhow!(e)))?;

    tracing::info!(uuid = %file_id, "File sent");
    Ok(response)
}
