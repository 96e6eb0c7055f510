use std::fmt::Debug;
use std::pin::Pin;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::checksum::digesting_stream::ByteStream;
use crate::error::ArtifactResult;

pub type StoreWriter = Pin<Box<dyn AsyncWrite + Send + 'static>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    pub name: String,
    pub is_directory: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreMetadata {
    pub is_directory: bool,
    pub size: u64,
    pub last_modified: SystemTime,
}

/// The physical store behind one storage. Keys are '/' separated paths relative to the
///  store's root, already normalized by the caller - but implementations still refuse to
///  resolve anything outside their root.
///
/// A writer returned by `open_write` makes its data visible no earlier than on `shutdown`.
///  Callers that need atomic replacement write to a scratch key and `move_entry` it into place.
#[async_trait]
pub trait BackingStore: Debug + Send + Sync {
    async fn open_read(&self, path: &str) -> ArtifactResult<Option<ByteStream>>;

    async fn open_write(&self, path: &str) -> ArtifactResult<StoreWriter>;

    async fn exists(&self, path: &str) -> ArtifactResult<bool>;

    async fn metadata(&self, path: &str) -> ArtifactResult<Option<StoreMetadata>>;

    /// direct children of a directory, sorted by name; empty if the directory does not exist
    async fn list_children(&self, path: &str) -> ArtifactResult<Vec<StoreEntry>>;

    /// deletes a file or a directory tree, returning whether anything was there
    async fn delete(&self, path: &str) -> ArtifactResult<bool>;

    /// moves a file or directory, replacing an existing file at the target
    async fn move_entry(&self, from: &str, to: &str) -> ArtifactResult<()>;

    async fn read_all(&self, path: &str) -> ArtifactResult<Option<Vec<u8>>> {
        let Some(mut stream) = self.open_read(path).await? else {
            return Ok(None);
        };
        let mut result = Vec::new();
        while let Some(chunk) = stream.next().await {
            result.extend_from_slice(&chunk?);
        }
        Ok(Some(result))
    }

    async fn write_all(&self, path: &str, data: Bytes) -> ArtifactResult<()> {
        let mut writer = self.open_write(path).await?;
        writer.write_all(&data).await?;
        writer.shutdown().await?;
        Ok(())
    }
}
