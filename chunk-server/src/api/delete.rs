use std::sync::Arc;

use axum::extract::{Extension, Query};
use serde::Deserialize;
use tracing::instrument;

use common::FileId;

use crate::error::{ErrorKind, ServerResult};
use crate::State;

#[derive(Deserialize)]
pub struct DeleteParams {
    uuid: String,
}

/// Removes a shard.
///
/// `DELETE /delete?uuid=<id>`
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub async fn delete_chunk(
    Extension(state): Extension<Arc<State>>,
    Query(params): Query<DeleteParams>,
) -> ServerResult<()> {
    let file_id = FileId::new(params.uuid).map_err(ErrorKind::RequestError)?;

    state.storage().delete(&file_id).await?;

    tracing::info!(uuid = %file_id, "File deleted");
    Ok(())
}
