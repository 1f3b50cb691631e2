pub mod delete;
pub mod get;
pub mod put;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete as delete_method, get as get_method, put as put_method};
use axum::Router;

use crate::config::Config;

pub fn router(config: &Config) -> Router {
    Router::new()
        .route(
            "/put",
            put_method(put::put_chunk).layer(DefaultBodyLimit::max(config.max_upload_size as usize)),
        )
        .route("/get", get_method(get::get_chunk))
        .route("/delete", delete_method(delete::delete_chunk))
}
