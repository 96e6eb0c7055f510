use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::checksum::algorithm::DigestAlgorithm;
use crate::error::{ArtifactError, ArtifactResult};
use crate::remote::{artifact_url, RemoteArtifact, RemoteFetcher};
use crate::storage::repository::RemoteRepository;

#[derive(Debug, Clone)]
struct RemoteFile {
    chunks: Vec<Bytes>,
    checksums: BTreeMap<DigestAlgorithm, String>,
}

/// In-memory stand-in for remote repositories, keyed by full URL. Supports injecting transport
///  failures and latency.
#[derive(Debug, Default)]
pub struct TransientFetcher {
    files: Mutex<HashMap<String, RemoteFile>>,
    pending_failures: Mutex<HashMap<String, usize>>,
    latency: Mutex<Option<Duration>>,
    requests: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl TransientFetcher {
    pub fn new() -> Arc<TransientFetcher> {
        Arc::new(TransientFetcher::default())
    }

    pub fn insert(&self, url: &str, data: &[u8]) {
        self.insert_chunked(url, vec![Bytes::copy_from_slice(data)], BTreeMap::new());
    }

    pub fn insert_with_checksum(&self, url: &str, data: &[u8], algorithm: DigestAlgorithm, hex_digest: &str) {
        let mut checksums = BTreeMap::new();
        checksums.insert(algorithm, hex_digest.to_string());
        self.insert_chunked(url, vec![Bytes::copy_from_slice(data)], checksums);
    }

    pub fn insert_chunked(&self, url: &str, chunks: Vec<Bytes>, checksums: BTreeMap<DigestAlgorithm, String>) {
        lock(&self.files).insert(url.to_string(), RemoteFile { chunks, checksums });
    }

    /// the next `count` requests for `url` fail with a transport error
    pub fn fail_next(&self, url: &str, count: usize) {
        lock(&self.pending_failures).insert(url.to_string(), count);
    }

    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.latency) = latency;
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::Acquire)
    }
}

#[async_trait]
impl RemoteFetcher for TransientFetcher {
    async fn fetch(&self, remote: &RemoteRepository, path: &str) -> ArtifactResult<RemoteArtifact> {
        let url = artifact_url(remote, path);
        self.requests.fetch_add(1, Ordering::AcqRel);
        trace!("fetching {}", url);

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        {
            let mut failures = lock(&self.pending_failures);
            if let Some(remaining) = failures.get_mut(&url) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ArtifactError::Transport(format!("connection reset fetching {}", url)));
                }
            }
        }

        let file = lock(&self.files).get(&url).cloned()
            .ok_or(ArtifactError::NotFound(url))?;
        let chunks: Vec<ArtifactResult<Bytes>> = file.chunks.into_iter().map(Ok).collect();
        Ok(RemoteArtifact {
            data: Box::pin(futures::stream::iter(chunks)),
            checksums: file.checksums,
        })
    }
}

#[cfg(test)]
mod test {
    use futures::StreamExt;

    use super::*;

    fn remote() -> RemoteRepository {
        RemoteRepository { url: "https://upstream.example.org/repo".to_string(), credentials: None }
    }

    #[tokio::test]
    async fn test_fetch() {
        let fetcher = TransientFetcher::new();
        fetcher.insert("https://upstream.example.org/repo/a/b.txt", b"ABC");

        let mut artifact = fetcher.fetch(&remote(), "a/b.txt").await.unwrap();
        assert_eq!(artifact.data.next().await.unwrap().unwrap(), Bytes::from_static(b"ABC"));
        assert!(artifact.data.next().await.is_none());

        assert!(matches!(fetcher.fetch(&remote(), "a/c.txt").await, Err(ArtifactError::NotFound(_))));
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let fetcher = TransientFetcher::new();
        fetcher.insert("https://upstream.example.org/repo/a/b.txt", b"ABC");
        fetcher.fail_next("https://upstream.example.org/repo/a/b.txt", 2);

        assert!(matches!(fetcher.fetch(&remote(), "a/b.txt").await, Err(ArtifactError::Transport(_))));
        assert!(matches!(fetcher.fetch(&remote(), "a/b.txt").await, Err(ArtifactError::Transport(_))));
        assert!(fetcher.fetch(&remote(), "a/b.txt").await.is_ok());
    }
}
