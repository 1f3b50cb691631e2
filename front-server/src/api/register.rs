use std::sync::Arc;

use anyhow::anyhow;
use axum::extract::{Extension, Multipart};
use reqwest::Url;
use tracing::instrument;

use crate::error::{ErrorKind, ServerError, ServerResult};
use crate::State;

/// Registers a chunk server.
///
/// `PUT /register_chunk_server` with a multipart `url` field holding an
/// absolute URL.
#[instrument(skip_all)]
#[axum_macros::debug_handler]
pub async fn register_chunk_server(
    Extension(state): Extension<Arc<State>>,
    mut multipart: Multipart,
) -> ServerResult<&'static str> {
    let mut url = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ServerError::request_error)?
    {
        if field.name() == Some("url") {
            url = Some(field.text().await.map_err(ServerError::request_error)?);
        }
    }
    let url = url.ok_or_else(|| ErrorKind::RequestError(anyhow!("URL not provided")))?;

    let parsed = Url::parse(&url).map_err(|_| ErrorKind::RequestError(anyhow!("invalid URL")))?;
    if !parsed.has_host() {
        return Err(ErrorKind::RequestError(anyhow!("invalid URL")).into());
    }

    tracing::info!(%url, "Registering chunk server");
    state
        .registry()
        .register(&url)
        .map_err(|_| ErrorKind::AlreadyRegistered)?;

    Ok("Chunk server registered successfully")
}
