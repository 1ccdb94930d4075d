//! Disk commit of a finished stream

use crate::core::{BuildError, Contents, FileItem};
use crate::pipeline::FileStream;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Sink that persists every item of a stream under a destination directory.
///
/// `write` resolves only once every item is on disk and every task behind
/// the stream has finished.
#[async_trait]
pub trait DiskWriter: Send + Sync {
    /// Returns the number of files written
    async fn write(&self, stream: FileStream, dest: &Path) -> Result<usize, BuildError>;
}

/// Writes items to the local file system
#[derive(Debug, Default, Clone)]
pub struct FsWriter;

impl FsWriter {
    async fn write_item(item: FileItem, dest: &Path) -> Result<bool, BuildError> {
        let target = dest.join(item.path());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BuildError::io(parent, e))?;
        }

        match item.into_contents() {
            Contents::Empty => {
                fs::create_dir_all(&target)
                    .await
                    .map_err(|e| BuildError::io(&target, e))?;
                Ok(false)
            }
            Contents::Buffered(bytes) => {
                fs::write(&target, &bytes)
                    .await
                    .map_err(|e| BuildError::io(&target, e))?;
                Ok(true)
            }
            Contents::Streamed(mut reader) => {
                let mut file = File::create(&target)
                    .await
                    .map_err(|e| BuildError::io(&target, e))?;
                tokio::io::copy(&mut reader, &mut file)
                    .await
                    .map_err(|e| BuildError::io(&target, e))?;
                file.flush().await.map_err(|e| BuildError::io(&target, e))?;
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl DiskWriter for FsWriter {
    async fn write(&self, mut stream: FileStream, dest: &Path) -> Result<usize, BuildError> {
        fs::create_dir_all(dest)
            .await
            .map_err(|e| BuildError::io(dest, e))?;

        let mut written = 0;
        while let Some(item) = stream.next().await {
            debug!("Writing {}", item.path().display());
            if Self::write_item(item, dest).await? {
                written += 1;
            }
        }
        stream.finish().await?;
        Ok(written)
    }
}
