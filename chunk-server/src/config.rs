use std::path::PathBuf;

use anyhow::{Context, Result};

use common::env;

/// Default port of a chunk server.
const DEFAULT_PORT: &str = "12090";
/// Default directory shards are stored under.
const DEFAULT_UPLOAD_DIR: &str = "tmp";
/// Default address of the front server to register with.
const DEFAULT_FRONT_SERVER_ADDRESS: &str = "http://front-server:13090";
/// Default cap on the in-memory portion of an upload.
const DEFAULT_MAX_UPLOAD_SIZE: i64 = 10 << 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on.
    pub port: u16,
    /// Directory shards are stored under, one file per shard.
    pub upload_dir: PathBuf,
    /// Base URL of the front server to register with.
    pub front_server_address: String,
    /// Upload size cap in bytes.
    pub max_upload_size: i64,
}

impl Config {
    /// Loads the configuration from the environment.
    ///
    /// An unparseable `PORT` aborts startup.
    pub fn load() -> Result<Config> {
        let port = env::get_string("PORT", DEFAULT_PORT);
        let port: u16 = port.parse().with_context(|| format!("invalid port: {port}"))?;

        Ok(Config {
            port,
            upload_dir: env::get_string("UPLOAD_DIR", DEFAULT_UPLOAD_DIR).into(),
            front_server_address: env::get_string(
                "FRONT_SERVER_ADDRESS",
                DEFAULT_FRONT_SERVER_ADDRESS,
            ),
            max_upload_size: env::get_parsed("MAX_UPLOAD_SIZE", DEFAULT_MAX_UPLOAD_SIZE),
        })
    }
}
