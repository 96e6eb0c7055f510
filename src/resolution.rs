//! Request level operations: resolve `(storage, repository, path)`, read with proxy and group
//!  semantics, deploy with checksums and validation, delete, undelete and trash handling.

pub mod events;
pub mod locks;

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_recursion::async_recursion;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::checksum::algorithm::DigestAlgorithm;
use crate::checksum::cache::ChecksumCache;
use crate::checksum::digesting_stream::{ByteStream, DigestingStream};
use crate::config::RemoteConfig;
use crate::coordinates::ArtifactCoordinates;
use crate::error::{ArtifactError, ArtifactResult, ValidationError};
use crate::layout::provider::PathKind;
use crate::layout::validators::{ValidationContext, ValidatorRegistry};
use crate::maven::coordinates::{MavenArtifactId, MavenArtifactRef, MavenClassifier, MavenCoordinates, MavenGroupId, MavenVersion};
use crate::maven::metadata_merger::{merge_metadata, MergeOutcome};
use crate::maven::metadata_xml::METADATA_FILE_NAME;
use crate::maven::paths::artifact_directory;
use crate::path::{RepositoryFileAttributes, RepositoryPath};
use crate::remote::RemoteFetcher;
use crate::storage::backing_store::BackingStore;
use crate::storage::registry::{StorageRegistry, TRASH_DIR};
use crate::storage::repository::{RemoteRepository, RepositoryType};

pub use events::{ArtifactEventListener, NoopEventListener};
pub use locks::PathLocks;

/// upper bound for uploaded sidecar checksum files
const MAX_CHECKSUM_FILE_SIZE: usize = 1024;

/// How often and how patiently transport failures of proxy fetches are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RemoteConfig::default())
    }
}

impl From<&RemoteConfig> for RetryPolicy {
    fn from(config: &RemoteConfig) -> Self {
        RetryPolicy {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff(),
            max_backoff: config.max_backoff(),
        }
    }
}

/// Result of a committed deploy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub path: RepositoryPath,
    pub coordinates: Option<ArtifactCoordinates>,
    pub checksums: BTreeMap<DigestAlgorithm, String>,
    pub length: u64,
}

/// Removes an uncommitted temp file when dropped before `disarm` - which covers errors as well
///  as the owning future being dropped on cancellation or client disconnect
struct TempFileGuard {
    store: Arc<dyn BackingStore>,
    key: Option<String>,
}

impl TempFileGuard {
    fn new(store: Arc<dyn BackingStore>, key: &str) -> TempFileGuard {
        TempFileGuard {
            store,
            key: Some(key.to_string()),
        }
    }

    fn disarm(&mut self) {
        self.key = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let store = self.store.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    trace!("removing abandoned temp file {}", key);
                    if let Err(e) = store.delete(&key).await {
                        warn!("failed to remove temp file {}: {}", key, e);
                    }
                });
            }
            Err(_) => warn!("no runtime to remove temp file {}", key),
        }
    }
}

pub struct ArtifactResolutionService {
    storages: Arc<StorageRegistry>,
    validators: Arc<ValidatorRegistry>,
    checksums: Arc<ChecksumCache>,
    fetcher: Arc<dyn RemoteFetcher>,
    listener: Arc<dyn ArtifactEventListener>,
    retry: RetryPolicy,
    locks: PathLocks,
}

impl ArtifactResolutionService {
    pub fn new(storages: Arc<StorageRegistry>, checksums: Arc<ChecksumCache>, fetcher: Arc<dyn RemoteFetcher>) -> ArtifactResolutionService {
        ArtifactResolutionService {
            storages,
            validators: Arc::new(ValidatorRegistry::with_defaults()),
            checksums,
            fetcher,
            listener: Arc::new(NoopEventListener),
            retry: RetryPolicy::default(),
            locks: PathLocks::new(),
        }
    }

    pub fn with_validators(mut self, validators: Arc<ValidatorRegistry>) -> ArtifactResolutionService {
        self.validators = validators;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ArtifactEventListener>) -> ArtifactResolutionService {
        self.listener = listener;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> ArtifactResolutionService {
        self.retry = retry;
        self
    }

    pub fn checksum_cache(&self) -> &Arc<ChecksumCache> {
        &self.checksums
    }

    /// Maps a request onto a path inside an existing, in-service repository
    pub fn resolve(&self, storage_id: &str, repository_id: &str, path: &str) -> ArtifactResult<RepositoryPath> {
        let (storage, repository) = self.storages.get_repository(storage_id, repository_id)?;
        if !repository.in_service {
            return Err(ValidationError::new("repository-status", format!("repository {} is out of service", repository.qualified_id())).into());
        }
        RepositoryPath::new(storage, repository, path)
    }

    pub async fn get_attributes(&self, storage_id: &str, repository_id: &str, path: &str) -> ArtifactResult<RepositoryFileAttributes> {
        self.resolve(storage_id, repository_id, path)?
            .read_attributes()
            .await
    }

    /// Opens an artifact, checksum or metadata file for reading. Proxy repositories fetch missing
    ///  files from their remote and serve the stored copy; groups try their members in order.
    pub async fn get_input_stream(&self, storage_id: &str, repository_id: &str, path: &str, cancel: &CancellationToken) -> ArtifactResult<ByteStream> {
        let path = self.resolve(storage_id, repository_id, path)?;
        let mut visited = HashSet::new();
        self.open(&path, cancel, &mut visited).await?
            .ok_or_else(|| ArtifactError::NotFound(path.to_string()))
    }

    #[async_recursion]
    async fn open(&self, path: &RepositoryPath, cancel: &CancellationToken, visited: &mut HashSet<String>) -> ArtifactResult<Option<ByteStream>> {
        if !visited.insert(path.repository_id().to_string()) {
            trace!("group cycle at {}, skipping", path);
            return Ok(None);
        }

        match &path.repository().repository_type {
            RepositoryType::Hosted => self.open_local(path).await,
            RepositoryType::Proxy(remote) => {
                if let Some(stream) = self.open_local(path).await? {
                    return Ok(Some(stream));
                }
                let target = match path.kind() {
                    // fetching the artifact produces its sidecars
                    PathKind::Checksum(_, artifact) => RepositoryPath::new(path.storage().clone(), path.repository().clone(), artifact)?,
                    _ => path.clone(),
                };
                match self.fetch_remote(&target, remote, cancel).await {
                    Ok(()) => self.open_local(path).await,
                    Err(ArtifactError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            }
            RepositoryType::Group(members) => {
                for member_id in members {
                    let Some(member) = path.storage().get_repository(member_id) else {
                        continue;
                    };
                    if !member.in_service {
                        continue;
                    }
                    let member_path = path.in_repository(member);
                    match self.open(&member_path, cancel, visited).await {
                        Ok(Some(stream)) => {
                            debug!("resolved {} via {}", path, member_path);
                            return Ok(Some(stream));
                        }
                        Ok(None) => {}
                        Err(ArtifactError::Cancelled) => return Err(ArtifactError::Cancelled),
                        Err(e) => warn!("group member {} failed for {}: {}", member_path.repository_id(), path, e),
                    }
                }
                Ok(None)
            }
        }
    }

    /// checksum files lock on their artifact, so a reader never sees an artifact together with
    ///  sidecars of a different deploy
    fn lock_key(path: &RepositoryPath) -> String {
        match path.kind() {
            PathKind::Checksum(_, artifact) => format!("{}/{}/{}", path.storage_id(), path.repository_id(), artifact),
            _ => path.to_string(),
        }
    }

    async fn open_local(&self, path: &RepositoryPath) -> ArtifactResult<Option<ByteStream>> {
        let _guard = self.locks.lock(&Self::lock_key(path)).await;
        let store = path.store();

        if let Some(stream) = store.open_read(&path.store_key()).await? {
            return Ok(Some(stream));
        }

        // a missing sidecar is regenerated from the artifact
        if let PathKind::Checksum(algorithm, artifact) = path.kind() {
            let artifact = RepositoryPath::new(path.storage().clone(), path.repository().clone(), artifact)?;
            let Some(digest) = self.artifact_digest(&artifact, algorithm).await? else {
                return Ok(None);
            };
            debug!("regenerating {} checksum for {}", algorithm, artifact);
            path.storage().write_atomic(&path.store_key(), Bytes::from(digest.clone())).await?;
            let stream = futures::stream::once(async move { Ok(Bytes::from(digest)) });
            return Ok(Some(Box::pin(stream)));
        }
        Ok(None)
    }

    /// Digest of a stored file: cached, else from its sidecar, else computed. `None` if the file
    ///  does not exist.
    async fn artifact_digest(&self, artifact: &RepositoryPath, algorithm: DigestAlgorithm) -> ArtifactResult<Option<String>> {
        let store = artifact.store();
        let cache_key = artifact.to_string();
        if let Some(digest) = self.checksums.get_checksum(&cache_key, algorithm) {
            if artifact.exists().await? {
                return Ok(Some(digest));
            }
            self.checksums.invalidate(&cache_key);
            return Ok(None);
        }
        if !artifact.exists().await? {
            return Ok(None);
        }

        let from_sidecar = store.read_all(&artifact.sidecar(algorithm).store_key()).await?
            .and_then(|content| algorithm.parse_sidecar_content(&String::from_utf8_lossy(&content)));
        let digest = match from_sidecar {
            Some(digest) => Some(digest),
            None => {
                let Some(stream) = store.open_read(&artifact.store_key()).await? else {
                    return Ok(None);
                };
                let mut digesting = DigestingStream::new(stream, artifact.to_string(), [algorithm]);
                while let Some(chunk) = digesting.next().await {
                    chunk?;
                }
                digesting.digests().get(&algorithm).cloned()
            }
        };
        if let Some(digest) = &digest {
            self.checksums.add_checksum(&cache_key, algorithm, digest);
        }
        Ok(digest)
    }

    /// Write-through caching of a remote file, retrying transport failures with exponential
    ///  backoff. Concurrent requests for the same path fetch once.
    async fn fetch_remote(&self, path: &RepositoryPath, remote: &RemoteRepository, cancel: &CancellationToken) -> ArtifactResult<()> {
        let mut backoff = failsafe::backoff::exponential(self.retry.initial_backoff, self.retry.max_backoff);
        let mut attempt = 0;
        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ArtifactError::Cancelled),
                r = self.fetch_once(path, remote) => r,
            };
            match result {
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = backoff.next().unwrap_or(self.retry.max_backoff);
                    warn!("fetching {} failed ({}), retry {} of {} in {:?}", path, e, attempt, self.retry.max_retries, delay);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(ArtifactError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                other => return other,
            }
        }
    }

    async fn fetch_once(&self, path: &RepositoryPath, remote: &RemoteRepository) -> ArtifactResult<()> {
        let lock_key = Self::lock_key(path);
        let guard = self.locks.lock(&lock_key).await;
        if path.exists().await? {
            trace!("{} was fetched concurrently", path);
            return Ok(());
        }

        info!("fetching {} from {}", path, remote.url);
        let artifact = self.fetcher.fetch(remote, path.relative_path()).await?;
        let coordinates = path.coordinates().ok().flatten();

        let (temp, digests, length) = self.write_temp(path, artifact.data, &artifact.checksums).await?;
        self.publish(path, temp, &digests, None).await?;
        drop(guard);

        debug!("cached {} ({} bytes)", path, length);
        if let Some(coordinates) = coordinates {
            self.listener.on_artifact_stored(&coordinates, path);
        }
        Ok(())
    }

    /// Deploys a file into a hosted repository. `expected` holds digests the client announced;
    ///  any mismatch discards the upload.
    pub async fn store(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
        data: ByteStream,
        expected: BTreeMap<DigestAlgorithm, String>,
    ) -> ArtifactResult<StoredArtifact> {
        let path = self.resolve(storage_id, repository_id, path)?;
        if !path.repository().is_hosted() {
            return Err(ValidationError::new("repository-type", format!("{} does not accept deployments", path.repository().qualified_id())).into());
        }

        match path.kind() {
            PathKind::Checksum(algorithm, artifact) => {
                let artifact = RepositoryPath::new(path.storage().clone(), path.repository().clone(), artifact)?;
                self.store_checksum(&path, &artifact, algorithm, data).await
            }
            PathKind::Metadata => {
                let (temp, digests, length) = self.write_temp(&path, data, &expected).await?;
                let _guard = self.locks.lock(&Self::lock_key(&path)).await;
                self.publish(&path, temp, &digests, None).await?;
                // manifests bypass validators but still say which version they describe
                let coordinates = path.coordinates()?;
                Ok(StoredArtifact { path: path.clone(), coordinates, checksums: digests, length })
            }
            PathKind::Artifact => {
                let coordinates = path.repository().layout.coordinates_from_path(path.relative_path())?;
                // fail fast before reading the upload; checked again when committing
                self.validate(&path, &coordinates).await?;

                let (temp, digests, length) = self.write_temp(&path, data, &expected).await?;
                {
                    let _guard = self.locks.lock(&Self::lock_key(&path)).await;
                    self.publish(&path, temp, &digests, Some(&coordinates)).await?;
                }
                info!("stored {} ({} bytes)", path, length);

                self.after_change(&path, Some(&coordinates)).await;
                self.listener.on_artifact_stored(&coordinates, &path);
                Ok(StoredArtifact { path: path.clone(), coordinates: Some(coordinates), checksums: digests, length })
            }
        }
    }

    async fn validate(&self, path: &RepositoryPath, coordinates: &ArtifactCoordinates) -> ArtifactResult<()> {
        let artifact_exists = path.exists().await?;
        self.validators.validate(&ValidationContext {
            repository: path.repository(),
            coordinates,
            artifact_exists,
        })?;
        Ok(())
    }

    /// Streams `data` into a fresh temp file, computing every digest the layout needs plus the
    ///  expected ones. Nothing is visible at the final location yet.
    async fn write_temp(
        &self,
        path: &RepositoryPath,
        data: ByteStream,
        expected: &BTreeMap<DigestAlgorithm, String>,
    ) -> ArtifactResult<(TempFileGuard, BTreeMap<DigestAlgorithm, String>, u64)> {
        let algorithms: BTreeSet<DigestAlgorithm> = path.digest_algorithms().iter()
            .chain(expected.keys())
            .copied()
            .collect();
        let mut digesting = DigestingStream::new(data, path.to_string(), algorithms);
        for (algorithm, digest) in expected {
            digesting = digesting.expect(*algorithm, digest.to_ascii_lowercase());
        }

        let storage = path.storage();
        let temp_key = storage.temp_key();
        let temp = TempFileGuard::new(storage.store().clone(), &temp_key);

        let mut writer = storage.store().open_write(&temp_key).await?;
        while let Some(chunk) = digesting.next().await {
            writer.write_all(&chunk?).await?;
        }
        writer.shutdown().await?;

        Ok((temp, digesting.digests().clone(), digesting.length()))
    }

    /// Moves a completed temp file into place. Callers hold the path lock. Existing content is
    ///  trashed (if the repository keeps a trash) before being replaced.
    async fn publish(
        &self,
        path: &RepositoryPath,
        mut temp: TempFileGuard,
        digests: &BTreeMap<DigestAlgorithm, String>,
        coordinates: Option<&ArtifactCoordinates>,
    ) -> ArtifactResult<()> {
        let storage = path.storage();
        let store = storage.store();
        let key = path.store_key();

        let exists = path.exists().await?;
        if let Some(coordinates) = coordinates {
            self.validators.validate(&ValidationContext {
                repository: path.repository(),
                coordinates,
                artifact_exists: exists,
            })?;
        }

        // only artifacts are worth keeping, metadata is regenerated anyway
        if exists && path.repository().trash_enabled && coordinates.is_some() {
            self.move_to_trash(path).await?;
        }

        let Some(temp_key) = temp.key.clone() else {
            return Err(ArtifactError::NotFound(format!("temp file for {}", path)));
        };
        store.move_entry(&temp_key, &key).await?;
        temp.disarm();

        let cache_key = path.to_string();
        self.checksums.invalidate(&cache_key);
        // every sidecar on disk must describe the new content, including ones uploaded before
        //  the artifact existed: layout digests are rewritten, anything else is dropped and
        //  regenerated on demand
        for algorithm in DigestAlgorithm::ALL {
            let sidecar_key = path.sidecar(algorithm).store_key();
            match digests.get(&algorithm) {
                Some(digest) if path.digest_algorithms().contains(&algorithm) => {
                    storage.write_atomic(&sidecar_key, Bytes::from(digest.clone())).await?;
                }
                _ => {
                    if store.delete(&sidecar_key).await? {
                        debug!("dropped stale {} checksum of {}", algorithm, path);
                    }
                }
            }
        }
        for (algorithm, digest) in digests {
            self.checksums.add_checksum(&cache_key, *algorithm, digest);
        }
        Ok(())
    }

    /// An uploaded sidecar for an existing artifact must match it and is not stored; for an
    ///  artifact that is not there (yet) it is stored as is.
    async fn store_checksum(
        &self,
        path: &RepositoryPath,
        artifact: &RepositoryPath,
        algorithm: DigestAlgorithm,
        mut data: ByteStream,
    ) -> ArtifactResult<StoredArtifact> {
        let mut content = Vec::new();
        while let Some(chunk) = data.next().await {
            content.extend_from_slice(&chunk?);
            if content.len() > MAX_CHECKSUM_FILE_SIZE {
                return Err(ValidationError::new("checksum", format!("{} is too large for a checksum file", path)).into());
            }
        }
        let digest = algorithm.parse_sidecar_content(&String::from_utf8_lossy(&content))
            .ok_or_else(|| ValidationError::new("checksum", format!("{} does not contain a {} digest", path, algorithm)))?;

        let _guard = self.locks.lock(&Self::lock_key(artifact)).await;
        let cache_key = artifact.to_string();

        match self.artifact_digest(artifact, algorithm).await? {
            Some(actual) if actual != digest => {
                return Err(ArtifactError::ChecksumMismatch {
                    path: artifact.to_string(),
                    algorithm,
                    expected: digest,
                    actual,
                });
            }
            Some(_) => {
                self.checksums.validate_checksum(&cache_key, algorithm, &digest);
                trace!("validated uploaded {} checksum for {}", algorithm, artifact);
            }
            None => {
                path.storage().write_atomic(&path.store_key(), Bytes::from(digest.clone())).await?;
                self.checksums.add_checksum(&cache_key, algorithm, &digest);
            }
        }

        let mut checksums = BTreeMap::new();
        checksums.insert(algorithm, digest);
        Ok(StoredArtifact {
            path: path.clone(),
            coordinates: None,
            checksums,
            length: content.len() as u64,
        })
    }

    /// Deletes a file or directory together with its sidecars, into the trash if the repository
    ///  keeps one
    pub async fn delete(&self, storage_id: &str, repository_id: &str, path: &str) -> ArtifactResult<()> {
        let path = self.resolve(storage_id, repository_id, path)?;
        let repository = path.repository();
        if matches!(repository.repository_type, RepositoryType::Group(_)) {
            return Err(ValidationError::new("repository-type", format!("cannot delete from group {}", repository.qualified_id())).into());
        }
        if !repository.allows_delete {
            return Err(ValidationError::new("repository-policy", format!("{} does not allow deletes", repository.qualified_id())).into());
        }

        {
            let _guard = self.locks.lock(&Self::lock_key(&path)).await;
            if !path.exists().await? {
                return Err(ArtifactError::NotFound(path.to_string()));
            }
            if repository.trash_enabled {
                self.move_to_trash(&path).await?;
            }
            else {
                let store = path.store();
                store.delete(&path.store_key()).await?;
                for algorithm in DigestAlgorithm::ALL {
                    store.delete(&path.sidecar(algorithm).store_key()).await?;
                }
            }
            match path.kind() {
                PathKind::Checksum(algorithm, artifact) => {
                    self.checksums.remove_checksum(&format!("{}/{}/{}", path.storage_id(), path.repository_id(), artifact), algorithm);
                }
                _ => self.checksums.invalidate(&path.to_string()),
            }
        }
        info!("deleted {}", path);

        let coordinates = path.coordinates().ok().flatten();
        self.after_change(&path, coordinates.as_ref()).await;
        self.listener.on_artifact_deleted(&path);
        Ok(())
    }

    /// Restores a file or directory from the repository's trash. Fails if something has been
    ///  deployed to the same path since.
    pub async fn undelete(&self, storage_id: &str, repository_id: &str, path: &str) -> ArtifactResult<()> {
        let path = self.resolve(storage_id, repository_id, path)?;
        let repository = path.repository();
        if !repository.trash_enabled {
            return Err(ValidationError::new("trash", format!("{} has no trash", repository.qualified_id())).into());
        }

        let storage = path.storage();
        let store = storage.store();
        let trash_key = storage.trash_key(path.repository_id(), path.relative_path());
        {
            let _guard = self.locks.lock(&Self::lock_key(&path)).await;
            if !store.exists(&trash_key).await? {
                return Err(ArtifactError::NotFound(format!("{} in trash", path)));
            }
            if path.exists().await? {
                return Err(ValidationError::new("trash", format!("{} exists, not restoring over it", path)).into());
            }

            store.move_entry(&trash_key, &path.store_key()).await?;
            for algorithm in DigestAlgorithm::ALL {
                let trashed_sidecar = format!("{}.{}", trash_key, algorithm.extension());
                if store.exists(&trashed_sidecar).await? {
                    store.move_entry(&trashed_sidecar, &path.sidecar(algorithm).store_key()).await?;
                }
            }
            self.checksums.invalidate(&path.to_string());
        }
        info!("restored {} from trash", path);

        let coordinates = path.coordinates().ok().flatten();
        self.after_change(&path, coordinates.as_ref()).await;
        if let Some(coordinates) = coordinates {
            self.listener.on_artifact_stored(&coordinates, &path);
        }
        Ok(())
    }

    /// Purges a repository's trash, returning whether there was anything in it
    pub async fn empty_trash(&self, storage_id: &str, repository_id: &str) -> ArtifactResult<bool> {
        let (storage, repository) = self.storages.get_repository(storage_id, repository_id)?;
        let key = format!("{}/{}", TRASH_DIR, repository.id);
        let removed = storage.store().delete(&key).await?;
        info!("emptied trash of {} (anything removed: {})", repository.qualified_id(), removed);
        Ok(removed)
    }

    /// Moves a file or directory and its sidecars into the trash, replacing older trashed copies
    async fn move_to_trash(&self, path: &RepositoryPath) -> ArtifactResult<()> {
        let storage = path.storage();
        let store = storage.store();
        let trash_key = storage.trash_key(path.repository_id(), path.relative_path());

        store.delete(&trash_key).await?;
        store.move_entry(&path.store_key(), &trash_key).await?;
        for algorithm in DigestAlgorithm::ALL {
            let sidecar = path.sidecar(algorithm).store_key();
            let trashed_sidecar = format!("{}.{}", trash_key, algorithm.extension());
            store.delete(&trashed_sidecar).await?;
            if store.exists(&sidecar).await? {
                store.move_entry(&sidecar, &trashed_sidecar).await?;
            }
        }
        debug!("moved {} to trash", path);
        Ok(())
    }

    /// Best effort follow-up of a committed change: rebuilds version metadata for layouts that
    ///  keep it. Failures are logged, the change itself stands.
    async fn after_change(&self, path: &RepositoryPath, coordinates: Option<&ArtifactCoordinates>) {
        if !path.repository().layout.supports_metadata_merge() || path.kind() != PathKind::Artifact {
            return;
        }
        let artifact = match coordinates.and_then(|c| c.as_maven()) {
            Some(maven) => maven.clone(),
            None => match maven_ref_for_directory(path.relative_path()) {
                Some(maven) => maven,
                None => return,
            },
        };

        match self.merge(path, &artifact).await {
            Ok(outcome) => trace!("merged metadata for {}: {:?}", path, outcome.versions),
            Err(e) => warn!("merging metadata after change of {} failed: {}", path, e),
        }
    }

    async fn merge(&self, path: &RepositoryPath, artifact: &MavenArtifactRef) -> ArtifactResult<MergeOutcome> {
        // same key as readers of the artifact level metadata file and its sidecars
        let metadata = RepositoryPath::new(
            path.storage().clone(),
            path.repository().clone(),
            &format!("{}/{}", artifact_directory(&artifact.coordinates.group_id, &artifact.coordinates.artifact_id), METADATA_FILE_NAME),
        )?;
        let _guard = self.locks.lock(&Self::lock_key(&metadata)).await;

        let outcome = merge_metadata(path, artifact).await?;
        for written in &outcome.written {
            let key = written.path.to_string();
            self.checksums.invalidate(&key);
            for (algorithm, digest) in &written.checksums {
                self.checksums.add_checksum(&key, *algorithm, digest);
            }
        }
        for deleted in &outcome.deleted {
            self.checksums.invalidate(&deleted.to_string());
        }
        Ok(outcome)
    }
}

/// Deleting a version directory (`group/path/artifactId/version`) affects the same metadata as
///  deleting one of its files
fn maven_ref_for_directory(relative: &str) -> Option<MavenArtifactRef> {
    let segments: Vec<&str> = relative.split('/').collect();
    if segments.len() < 3 {
        return None;
    }
    let version = segments[segments.len() - 1];
    let artifact_id = segments[segments.len() - 2];
    let group_id = segments[..segments.len() - 2].join(".");

    Some(MavenArtifactRef {
        coordinates: MavenCoordinates {
            group_id: MavenGroupId(group_id),
            artifact_id: MavenArtifactId(artifact_id.to_string()),
            version: MavenVersion::parse_base_version(version),
        },
        classifier: MavenClassifier::Unclassified,
        file_extension: ".pom".to_string(),
    })
}
