use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::trace;

use crate::checksum::algorithm::DigestAlgorithm;
use crate::coordinates::ArtifactCoordinates;
use crate::error::{ArtifactError, ArtifactResult};
use crate::layout::provider::PathKind;
use crate::storage::backing_store::BackingStore;
use crate::storage::registry::Storage;
use crate::storage::repository::Repository;

/// Checks a caller supplied repository relative path. Anything that could address something
///  outside the repository is rejected before the backing store ever sees it.
pub fn normalize_relative_path(path: &str) -> ArtifactResult<String> {
    if path.is_empty() {
        return Err(ArtifactError::invalid_path(path, "empty path"));
    }
    if path.starts_with('/') {
        return Err(ArtifactError::invalid_path(path, "absolute path"));
    }
    if path.contains('\\') {
        return Err(ArtifactError::invalid_path(path, "backslash in path"));
    }
    if path.contains('\0') {
        return Err(ArtifactError::invalid_path(path, "NUL in path"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(ArtifactError::invalid_path(path, "empty path segment")),
            "." | ".." => return Err(ArtifactError::invalid_path(path, "relative path segment")),
            _ => {}
        }
    }
    Ok(path.to_string())
}

/// One location inside a repository. Cheap to create and never cached beyond a request; the
///  backing store is the durable entity.
#[derive(Debug, Clone)]
pub struct RepositoryPath {
    storage: Arc<Storage>,
    repository: Arc<Repository>,
    relative: String,
}

impl RepositoryPath {
    pub fn new(storage: Arc<Storage>, repository: Arc<Repository>, path: &str) -> ArtifactResult<RepositoryPath> {
        let relative = normalize_relative_path(path)?;
        Ok(RepositoryPath {
            storage,
            repository,
            relative,
        })
    }

    pub fn storage_id(&self) -> &str {
        &self.storage.id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository.id
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    pub fn file_name(&self) -> &str {
        self.relative.rsplit('/').next().unwrap_or(&self.relative)
    }

    pub(crate) fn store(&self) -> &Arc<dyn BackingStore> {
        self.storage.store()
    }

    /// key of this path in the storage's backing store
    pub fn store_key(&self) -> String {
        format!("{}/{}", self.repository.id, self.relative)
    }

    /// the same relative path in another repository of the same storage
    pub fn in_repository(&self, repository: Arc<Repository>) -> RepositoryPath {
        RepositoryPath {
            storage: self.storage.clone(),
            repository,
            relative: self.relative.clone(),
        }
    }

    /// `child` must itself be a valid relative path
    pub fn resolve(&self, child: &str) -> ArtifactResult<RepositoryPath> {
        let child = normalize_relative_path(child)?;
        Ok(RepositoryPath {
            storage: self.storage.clone(),
            repository: self.repository.clone(),
            relative: format!("{}/{}", self.relative, child),
        })
    }

    pub fn parent(&self) -> Option<RepositoryPath> {
        let (parent, _) = self.relative.rsplit_once('/')?;
        Some(RepositoryPath {
            storage: self.storage.clone(),
            repository: self.repository.clone(),
            relative: parent.to_string(),
        })
    }

    pub fn sidecar(&self, algorithm: DigestAlgorithm) -> RepositoryPath {
        RepositoryPath {
            storage: self.storage.clone(),
            repository: self.repository.clone(),
            relative: algorithm.sidecar_path(&self.relative),
        }
    }

    pub fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        self.repository.layout.digest_algorithms()
    }

    pub fn kind(&self) -> PathKind<'_> {
        self.repository.layout.classify(&self.relative)
    }

    /// `None` for checksum and metadata files; a parse error for anything else the layout
    ///  does not recognize
    /// Artifacts must parse. Metadata files only have coordinates when they are a version's
    ///  manifest (npm `package.json`, nuget `.nuspec`); directory level files have none.
    pub fn coordinates(&self) -> ArtifactResult<Option<ArtifactCoordinates>> {
        match self.kind() {
            PathKind::Artifact => Ok(Some(self.repository.layout.coordinates_from_path(&self.relative)?)),
            PathKind::Metadata => Ok(self.repository.layout.coordinates_from_path(&self.relative).ok()),
            PathKind::Checksum(..) => Ok(None),
        }
    }

    pub async fn exists(&self) -> ArtifactResult<bool> {
        self.store().exists(&self.store_key()).await
    }

    /// Resolves coordinates, sidecar checksums and existence in one go. Nothing is cached: two
    ///  calls read the store twice.
    pub async fn read_attributes(&self) -> ArtifactResult<RepositoryFileAttributes> {
        let store = self.store();
        let metadata = store.metadata(&self.store_key()).await?;
        let coordinates = self.coordinates().ok().flatten();

        let mut checksums = BTreeMap::new();
        if metadata.as_ref().map(|m| !m.is_directory).unwrap_or(false) {
            for algorithm in self.digest_algorithms() {
                let sidecar = self.sidecar(*algorithm).store_key();
                if let Some(content) = store.read_all(&sidecar).await? {
                    match algorithm.parse_sidecar_content(&String::from_utf8_lossy(&content)) {
                        Some(digest) => {
                            checksums.insert(*algorithm, digest);
                        }
                        None => trace!("ignoring malformed sidecar {}", sidecar),
                    }
                }
            }
        }

        let mut tags = BTreeSet::new();
        match self.kind() {
            PathKind::Checksum(..) => {
                tags.insert(ArtifactTag::Checksum);
            }
            PathKind::Metadata => {
                tags.insert(ArtifactTag::Metadata);
            }
            PathKind::Artifact => {}
        }
        if let Some(maven) = coordinates.as_ref().and_then(|c| c.as_maven()) {
            if maven.coordinates.version.is_snapshot() {
                tags.insert(ArtifactTag::Snapshot);
            }
        }

        Ok(RepositoryFileAttributes {
            coordinates,
            checksums,
            tags,
            exists: metadata.is_some(),
            is_directory: metadata.as_ref().map(|m| m.is_directory).unwrap_or(false),
            size: metadata.as_ref().map(|m| m.size),
            last_modified: metadata.map(|m| m.last_modified),
        })
    }
}

impl PartialEq for RepositoryPath {
    fn eq(&self, other: &Self) -> bool {
        self.storage.id == other.storage.id
            && self.repository.id == other.repository.id
            && self.relative == other.relative
    }
}
impl Eq for RepositoryPath {}

impl Hash for RepositoryPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.storage.id.hash(state);
        self.repository.id.hash(state);
        self.relative.hash(state);
    }
}

impl Display for RepositoryPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.storage.id, self.repository.id, self.relative)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactTag {
    Checksum,
    Metadata,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFileAttributes {
    pub coordinates: Option<ArtifactCoordinates>,
    pub checksums: BTreeMap<DigestAlgorithm, String>,
    pub tags: BTreeSet<ArtifactTag>,
    pub exists: bool,
    pub is_directory: bool,
    pub size: Option<u64>,
    pub last_modified: Option<SystemTime>,
}

#[cfg(test)]
mod test {
    use bytes::Bytes;
    use rstest::*;

    use crate::layout::provider::LayoutProvider;
    use crate::storage::transient_backing_store::TransientBackingStore;

    use super::*;

    fn repository_path(layout: LayoutProvider, path: &str) -> ArtifactResult<RepositoryPath> {
        let mut storage = Storage::new("storage0", Arc::new(TransientBackingStore::new()));
        storage.add_repository(Repository::new("storage0", "repo", layout)).unwrap();
        let repository = storage.get_repository("repo").unwrap();
        RepositoryPath::new(Arc::new(storage), repository, path)
    }

    #[rstest]
    #[case::empty("")]
    #[case::absolute("/etc/passwd")]
    #[case::parent("../../etc/passwd")]
    #[case::embedded_parent("com/../../other-repo/secret.jar")]
    #[case::current("com/./lib.jar")]
    #[case::double_slash("com//lib.jar")]
    #[case::trailing_slash("com/example/")]
    #[case::backslash("com\\..\\secret")]
    #[case::nul("com/lib\0.jar")]
    fn test_rejects_invalid_paths(#[case] path: &str) {
        assert!(matches!(normalize_relative_path(path), Err(ArtifactError::InvalidPath { .. })));
        assert!(matches!(repository_path(LayoutProvider::Raw, path), Err(ArtifactError::InvalidPath { .. })));
    }

    #[rstest]
    #[case::plain("com/example/lib/1.0/lib-1.0.jar")]
    #[case::dotted_name("a/.hidden")]
    #[case::dots_in_name("a/..b/c")]
    fn test_accepts_valid_paths(#[case] path: &str) {
        assert_eq!(normalize_relative_path(path).unwrap(), path);
    }

    #[test]
    fn test_identity() {
        let a = repository_path(LayoutProvider::Maven, "com/example/lib/1.0/lib-1.0.jar").unwrap();
        let b = a.in_repository(a.repository().clone());
        assert_eq!(a, b);
        assert_eq!(a.store_key(), "repo/com/example/lib/1.0/lib-1.0.jar");
        assert_eq!(a.to_string(), "storage0/repo/com/example/lib/1.0/lib-1.0.jar");
        assert_eq!(a.file_name(), "lib-1.0.jar");
        assert_eq!(a.parent().unwrap().relative_path(), "com/example/lib/1.0");
        assert_eq!(a.sidecar(DigestAlgorithm::Sha1).relative_path(), "com/example/lib/1.0/lib-1.0.jar.sha1");
        assert_eq!(a.digest_algorithms(), &[DigestAlgorithm::Md5, DigestAlgorithm::Sha1]);
        assert!(a.resolve("../x").is_err());
    }

    #[test]
    fn test_coordinates() {
        let artifact = repository_path(LayoutProvider::Maven, "com/example/lib/1.0/lib-1.0.jar").unwrap();
        assert!(artifact.coordinates().unwrap().is_some());

        let checksum = repository_path(LayoutProvider::Maven, "com/example/lib/1.0/lib-1.0.jar.sha1").unwrap();
        assert_eq!(checksum.coordinates().unwrap(), None);

        let garbage = repository_path(LayoutProvider::Maven, "lib.jar").unwrap();
        assert!(matches!(garbage.coordinates(), Err(ArtifactError::CoordinateParse(_))));
    }

    #[rstest]
    #[case::maven_metadata(LayoutProvider::Maven, "com/example/lib/maven-metadata.xml", None)]
    #[case::npm_manifest(LayoutProvider::Npm, "@types/node/20.1.0/package.json", Some("@types/node@20.1.0"))]
    #[case::npm_stray_manifest(LayoutProvider::Npm, "tools/package.json", None)]
    #[case::nuspec(LayoutProvider::Nuget, "Serilog/3.1.1/Serilog.nuspec", Some("Serilog:3.1.1"))]
    fn test_metadata_coordinates(#[case] layout: LayoutProvider, #[case] path: &str, #[case] expected: Option<&str>) {
        let path = repository_path(layout, path).unwrap();
        assert_eq!(path.kind(), PathKind::Metadata);
        assert_eq!(path.coordinates().unwrap().map(|c| c.id()).as_deref(), expected);
    }

    #[tokio::test]
    async fn test_read_attributes() {
        let path = repository_path(LayoutProvider::Maven, "com/example/lib/1.0-SNAPSHOT/lib-1.0-SNAPSHOT.jar").unwrap();
        let attributes = path.read_attributes().await.unwrap();
        assert!(!attributes.exists);
        assert!(attributes.checksums.is_empty());
        assert!(attributes.tags.contains(&ArtifactTag::Snapshot));

        let store = path.store();
        store.write_all(&path.store_key(), Bytes::from_static(b"ABC")).await.unwrap();
        store.write_all(&path.sidecar(DigestAlgorithm::Sha1).store_key(), Bytes::from_static(b"3c01bdbb26f358bab27f267924aa2c9a03fcfdb8  lib-1.0-SNAPSHOT.jar\n")).await.unwrap();

        let attributes = path.read_attributes().await.unwrap();
        assert!(attributes.exists);
        assert_eq!(attributes.size, Some(3));
        assert_eq!(attributes.checksums.get(&DigestAlgorithm::Sha1).map(|s| s.as_str()), Some("3c01bdbb26f358bab27f267924aa2c9a03fcfdb8"));
        assert_eq!(attributes.checksums.get(&DigestAlgorithm::Md5), None);
        assert_eq!(attributes.coordinates.as_ref().and_then(|c| c.field("artifactId")).as_deref(), Some("lib"));
    }
}
