use std::io::Cursor;
use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::{Extension, Multipart};
use bytes::Bytes;
use tracing::instrument;

use common::FileId;

use crate::error::{ErrorKind, ServerError, ServerResult};
use crate::State;

/// Stores a shard.
///
/// `PUT /put` with multipart `uuid` and `file` fields.
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub async fn put_chunk(
    Extension(state): Extension<Arc<State>>,
    mut multipart: Multipart,
) -> ServerResult<()> {
    let mut uuid: Option<String> = None;
    let mut payload: Option<Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ServerError::request_error)?
    {
        match field.name() {
            Some("uuid") => {
                uuid = Some(field.text().await.map_err(ServerError::request_error)?);
            }
            Some("file") => {
                payload = Some(field.bytes().await.map_err(ServerError::request_error)?);
            }
            _ => {}
        }
    }

    let uuid = uuid.ok_or_else(|| ErrorKind::RequestError(anyhow!("no uuid field in form")))?;
    let file_id = FileId::new(uuid).map_err(ErrorKind::RequestError)?;
    let payload =
        payload.ok_or_else(|| ErrorKind::RequestError(anyhow!("no file field in form")))?;

    state
        .storage()
        .save(&file_id, &mut Cursor::new(payload))
        .await?;

    tracing::info!(uuid = %file_id, "File uploaded");
    Ok(())
}
