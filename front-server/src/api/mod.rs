pub mod get;
pub mod put;
pub mod register;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get as get_method, put as put_method};
use axum::Router;

use crate::config::Config;

pub fn router(config: &Config) -> Router {
    Router::new()
        .route(
            "/register_chunk_server",
            put_method(register::register_chunk_server),
        )
        .route(
            "/put",
            put_method(put::put_file).layer(DefaultBodyLimit::max(config.max_upload_size as usize)),
        )
        .route("/get", get_method(get::get_file))
}
