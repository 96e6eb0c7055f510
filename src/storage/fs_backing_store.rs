use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::fs::{create_dir_all, metadata, read_dir, remove_dir_all, remove_file, rename, try_exists, OpenOptions};
use tokio_util::io::ReaderStream;
use tracing::{error, trace, warn};
use uuid::Uuid;

use crate::checksum::digesting_stream::ByteStream;
use crate::error::{ArtifactError, ArtifactResult};
use crate::storage::backing_store::{BackingStore, StoreEntry, StoreMetadata, StoreWriter};
use crate::storage::registry::TEMP_DIR;

/// Backing store on a local (or mounted network) file system
#[derive(Debug)]
pub struct FsBackingStore {
    root: PathBuf, // canonical
}

impl FsBackingStore {
    pub fn new(root: impl AsRef<Path>) -> ArtifactResult<FsBackingStore> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = std::fs::canonicalize(root.as_ref())?;
        Ok(FsBackingStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a store key to a file system path. Keys must be relative and free of `.` / `..`
    ///  segments, and the deepest existing ancestor must not resolve (through symlinks)
    ///  to a location outside the root.
    async fn file_path(&self, key: &str) -> ArtifactResult<PathBuf> {
        let mut result = self.root.clone();
        if !key.is_empty() {
            for segment in key.split('/') {
                let mut components = Path::new(segment).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(c)), None) => result.push(c),
                    _ => return Err(ArtifactError::invalid_path(key, "not a plain relative path")),
                }
            }
        }

        let mut existing = result.as_path();
        loop {
            match tokio::fs::canonicalize(existing).await {
                Ok(canonical) => {
                    if !canonical.starts_with(&self.root) {
                        error!("store key {:?} resolves to {} outside of {}", key, canonical.display(), self.root.display());
                        return Err(ArtifactError::invalid_path(key, "resolves outside of the storage root"));
                    }
                    break;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    match existing.parent() {
                        Some(parent) => existing = parent,
                        None => break,
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl BackingStore for FsBackingStore {
    async fn open_read(&self, path: &str) -> ArtifactResult<Option<ByteStream>> {
        let file_path = self.file_path(path).await?;
        trace!("opening {} for reading", file_path.display());

        let file = match OpenOptions::new().read(true).open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if file.metadata().await?.is_dir() {
            return Ok(None);
        }

        let stream = ReaderStream::new(file)
            .map(|chunk| chunk.map_err(ArtifactError::from));
        Ok(Some(Box::pin(stream)))
    }

    async fn open_write(&self, path: &str) -> ArtifactResult<StoreWriter> {
        let file_path = self.file_path(path).await?;
        trace!("opening {} for writing", file_path.display());

        if let Some(parent) = file_path.parent() {
            create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&file_path)
            .await?;
        Ok(Box::pin(file))
    }

    async fn exists(&self, path: &str) -> ArtifactResult<bool> {
        let file_path = self.file_path(path).await?;
        Ok(try_exists(file_path).await?)
    }

    async fn metadata(&self, path: &str) -> ArtifactResult<Option<StoreMetadata>> {
        let file_path = self.file_path(path).await?;
        match metadata(&file_path).await {
            Ok(m) => Ok(Some(StoreMetadata {
                is_directory: m.is_dir(),
                size: m.len(),
                last_modified: m.modified()?,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_children(&self, path: &str) -> ArtifactResult<Vec<StoreEntry>> {
        match self.metadata(path).await? {
            Some(m) if m.is_directory => {}
            _ => return Ok(vec![]),
        }

        let dir_path = self.file_path(path).await?;
        let mut entries = match read_dir(&dir_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut result = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            result.push(StoreEntry {
                name,
                is_directory: entry.file_type().await?.is_dir(),
            });
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn delete(&self, path: &str) -> ArtifactResult<bool> {
        let file_path = self.file_path(path).await?;
        trace!("deleting {}", file_path.display());

        let Some(m) = self.metadata(path).await? else {
            return Ok(false);
        };
        if m.is_directory {
            // First, atomically move the directory out of the repository tree so that partial
            //  deletes never leave a half-populated directory where listings can see it
            let temp_dir = self.root.join(TEMP_DIR);
            create_dir_all(&temp_dir).await?;
            let temp_path = temp_dir.join(format!("{}.deleting", Uuid::new_v4().as_hyphenated()));
            rename(&file_path, &temp_path).await?;
            if let Err(e) = remove_dir_all(&temp_path).await {
                warn!("failed to remove {}: {}", temp_path.display(), e);
            }
        }
        else {
            remove_file(&file_path).await?;
        }
        Ok(true)
    }

    async fn move_entry(&self, from: &str, to: &str) -> ArtifactResult<()> {
        let from_path = self.file_path(from).await?;
        let to_path = self.file_path(to).await?;
        trace!("moving {} to {}", from_path.display(), to_path.display());

        if let Some(parent) = to_path.parent() {
            create_dir_all(parent).await?;
        }
        rename(from_path, to_path).await?;
        Ok(())
    }
}
