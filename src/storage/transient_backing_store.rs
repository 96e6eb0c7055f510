use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWrite;

use crate::checksum::digesting_stream::ByteStream;
use crate::error::{ArtifactError, ArtifactResult};
use crate::storage::backing_store::{BackingStore, StoreEntry, StoreMetadata, StoreWriter};

#[derive(Debug, Clone)]
struct TransientFile {
    data: Bytes,
    last_modified: SystemTime,
}

type Files = Arc<Mutex<BTreeMap<String, TransientFile>>>;

/// in-memory backing store, neither optimized nor particularly robust - for testing purposes
///  and storages configured without a base directory. Directories exist implicitly as long as
///  they contain a file.
#[derive(Debug, Default)]
pub struct TransientBackingStore {
    files: Files,
}

impl TransientBackingStore {
    pub fn new() -> TransientBackingStore {
        Default::default()
    }

    /// Overrides a file's modification time, e.g. to set up version ordering in tests
    pub fn set_last_modified(&self, path: &str, last_modified: SystemTime) -> bool {
        match lock(&self.files).get_mut(path) {
            Some(file) => {
                file.last_modified = last_modified;
                true
            }
            None => false,
        }
    }

    pub fn file_count(&self) -> usize {
        lock(&self.files).len()
    }
}

fn lock(files: &Files) -> MutexGuard<'_, BTreeMap<String, TransientFile>> {
    files.lock().unwrap_or_else(|e| e.into_inner())
}

fn check_key(key: &str) -> ArtifactResult<()> {
    if key.is_empty() {
        return Ok(());
    }
    if key.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        return Err(ArtifactError::invalid_path(key, "not a plain relative path"));
    }
    Ok(())
}

fn dir_prefix(path: &str) -> String {
    if path.is_empty() {
        String::new()
    }
    else {
        format!("{}/", path)
    }
}

#[async_trait]
impl BackingStore for TransientBackingStore {
    async fn open_read(&self, path: &str) -> ArtifactResult<Option<ByteStream>> {
        check_key(path)?;
        let data = match lock(&self.files).get(path) {
            Some(file) => file.data.clone(),
            None => return Ok(None),
        };
        let stream = futures::stream::once(async move { Ok::<_, ArtifactError>(data) });
        Ok(Some(Box::pin(stream)))
    }

    async fn open_write(&self, path: &str) -> ArtifactResult<StoreWriter> {
        check_key(path)?;
        if path.is_empty() {
            return Err(ArtifactError::invalid_path(path, "cannot write to the root"));
        }
        Ok(Box::pin(TransientWriter {
            key: path.to_string(),
            buffer: Vec::new(),
            files: self.files.clone(),
        }))
    }

    async fn exists(&self, path: &str) -> ArtifactResult<bool> {
        Ok(self.metadata(path).await?.is_some())
    }

    async fn metadata(&self, path: &str) -> ArtifactResult<Option<StoreMetadata>> {
        check_key(path)?;
        let files = lock(&self.files);
        if let Some(file) = files.get(path) {
            return Ok(Some(StoreMetadata {
                is_directory: false,
                size: file.data.len() as u64,
                last_modified: file.last_modified,
            }));
        }

        let prefix = dir_prefix(path);
        let last_modified = files.range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(_, f)| f.last_modified)
            .max();
        Ok(last_modified.map(|last_modified| StoreMetadata {
            is_directory: true,
            size: 0,
            last_modified,
        }))
    }

    async fn list_children(&self, path: &str) -> ArtifactResult<Vec<StoreEntry>> {
        check_key(path)?;
        let prefix = dir_prefix(path);
        let files = lock(&self.files);

        let mut result: Vec<StoreEntry> = Vec::new();
        for key in files.range(prefix.clone()..).map(|(k, _)| k).take_while(|k| k.starts_with(&prefix)) {
            let rest = &key[prefix.len()..];
            let entry = match rest.find('/') {
                Some(idx) => StoreEntry { name: rest[..idx].to_string(), is_directory: true },
                None => StoreEntry { name: rest.to_string(), is_directory: false },
            };
            if result.last() != Some(&entry) {
                result.push(entry);
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        result.dedup();
        Ok(result)
    }

    async fn delete(&self, path: &str) -> ArtifactResult<bool> {
        check_key(path)?;
        let mut files = lock(&self.files);
        if files.remove(path).is_some() {
            return Ok(true);
        }
        let prefix = dir_prefix(path);
        let before = files.len();
        files.retain(|k, _| !k.starts_with(&prefix));
        Ok(files.len() != before)
    }

    async fn move_entry(&self, from: &str, to: &str) -> ArtifactResult<()> {
        check_key(from)?;
        check_key(to)?;
        let mut files = lock(&self.files);

        if let Some(file) = files.remove(from) {
            files.insert(to.to_string(), file);
            return Ok(());
        }

        let from_prefix = dir_prefix(from);
        let to_prefix = dir_prefix(to);
        let keys: Vec<String> = files.keys()
            .filter(|k| k.starts_with(&from_prefix))
            .cloned()
            .collect();
        if keys.is_empty() {
            return Err(ArtifactError::StorageIo(std::io::Error::new(std::io::ErrorKind::NotFound, format!("nothing to move at {}", from))));
        }
        for key in keys {
            if let Some(file) = files.remove(&key) {
                files.insert(format!("{}{}", to_prefix, &key[from_prefix.len()..]), file);
            }
        }
        Ok(())
    }
}

/// Buffers all data and publishes it atomically on shutdown
struct TransientWriter {
    key: String,
    buffer: Vec<u8>,
    files: Files,
}

impl AsyncWrite for TransientWriter {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        self.get_mut().buffer.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let data = Bytes::from(std::mem::take(&mut this.buffer));
        lock(&this.files).insert(this.key.clone(), TransientFile {
            data,
            last_modified: SystemTime::now(),
        });
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_implicit_directories() {
        let store = TransientBackingStore::new();
        store.write_all("r/com/example/lib/1.0/lib-1.0.jar", Bytes::from_static(b"ABC")).await.unwrap();
        store.write_all("r/com/example/lib/1.0/lib-1.0.pom", Bytes::from_static(b"<p/>")).await.unwrap();
        store.write_all("r/com/example/lib/2.0/lib-2.0.pom", Bytes::from_static(b"<p/>")).await.unwrap();

        assert_eq!(
            store.list_children("r/com/example/lib").await.unwrap(),
            vec![
                StoreEntry { name: "1.0".to_string(), is_directory: true },
                StoreEntry { name: "2.0".to_string(), is_directory: true },
            ]
        );
        assert!(store.exists("r/com/example").await.unwrap());
        assert!(store.metadata("r/com").await.unwrap().unwrap().is_directory);
        assert!(!store.exists("r/com/other").await.unwrap());
    }

    #[tokio::test]
    async fn test_data_visible_only_after_shutdown() {
        use tokio::io::AsyncWriteExt;

        let store = TransientBackingStore::new();
        let mut writer = store.open_write("a/b").await.unwrap();
        writer.write_all(b"partial").await.unwrap();
        assert!(!store.exists("a/b").await.unwrap());

        writer.shutdown().await.unwrap();
        assert_eq!(store.read_all("a/b").await.unwrap().unwrap(), b"partial");
    }

    #[tokio::test]
    async fn test_move_and_delete_directory() {
        let store = TransientBackingStore::new();
        store.write_all("a/x/1", Bytes::from_static(b"1")).await.unwrap();
        store.write_all("a/x/y/2", Bytes::from_static(b"2")).await.unwrap();
        store.write_all("a/xz", Bytes::from_static(b"3")).await.unwrap();

        store.move_entry("a/x", "t/a/x").await.unwrap();
        assert!(store.exists("t/a/x/y/2").await.unwrap());
        assert!(store.exists("a/xz").await.unwrap());
        assert!(!store.exists("a/x").await.unwrap());

        assert!(store.delete("t").await.unwrap());
        assert_eq!(store.file_count(), 1);
        assert!(store.move_entry("nope", "other").await.is_err());
    }
}
