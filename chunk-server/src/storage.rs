//! Shard store backed by a local directory, one file per shard named by
//! its file id.

use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;

use anyhow::Result;
use tokio::fs::{self, File};
use tokio::io::{self, AsyncRead};

use common::FileId;

use crate::error::{ErrorKind, ServerError, ServerResult};

#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).await?;

        Ok(Self { root })
    }

    fn shard_path(&self, id: &FileId) -> PathBuf {
        self.root.join(id.as_str())
    }

    /// Writes a shard from the stream.
    pub async fn save(
        &self,
        id: &FileId,
        mut stream: &mut (dyn AsyncRead + Unpin + Send),
    ) -> ServerResult<()> {
        let mut file = File::create(self.shard_path(id))
            .await
            .map_err(ServerError::storage_error)?;

        io::copy(&mut stream, &mut file)
            .await
            .map_err(ServerError::storage_error)?;

        Ok(())
    }

    /// Opens a shard for reading, returning the file and its size.
    pub async fn open(&self, id: &FileId) -> ServerResult<(File, u64)> {
        let file = match File::open(self.shard_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                return Err(ErrorKind::NotFound.into());
            }
            Err(e) => return Err(ServerError::storage_error(e)),
        };

        let size = file
            .metadata()
            .await
            .map_err(ServerError::storage_error)?
            .len();

        Ok((file, size))
    }

    /// Deletes a shard.
    pub async fn delete(&self, id: &FileId) -> ServerResult<()> {
        match fs::remove_file(self.shard_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Err(ErrorKind::NotFound.into()),
            Err(e) => Err(ServerError::storage_error(e)),
        }
    }
}
