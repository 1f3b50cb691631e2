use std::net::SocketAddr;

use anyhow::{ensure, Result};

use common::env;

/// Default port of the front server.
const DEFAULT_PORT: u16 = 13090;
/// Default number of shards each upload is split into.
const DEFAULT_NUM_PARTS: usize = 6;
/// Default cap on the in-memory portion of an upload.
const DEFAULT_MAX_UPLOAD_SIZE: i64 = 10 << 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address to listen on.
    pub listen: SocketAddr,
    /// Number of shards each upload is split into.
    pub num_parts: usize,
    /// Upload size cap in bytes.
    pub max_upload_size: i64,
}

impl Config {
    /// Loads the configuration from the environment.
    pub fn load() -> Result<Config> {
        let port = env::get_parsed("PORT", DEFAULT_PORT);
        let num_parts = env::get_parsed("NUM_PARTS", DEFAULT_NUM_PARTS);
        let max_upload_size = env::get_parsed("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE);

        ensure!(num_parts >= 1, "NUM_PARTS must be at least 1");
        ensure!(max_upload_size >= 0, "MAX_UPLOAD_SIZE must not be negative");

        Ok(Config {
            listen: SocketAddr::from(([0, 0, 0, 0], port)),
            num_parts,
            max_upload_size,
        })
    }
}
