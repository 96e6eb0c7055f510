use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{RepositoryConfig, RepositoryTypeConfig, StorageConfig};
use crate::error::{ArtifactError, ArtifactResult};
use crate::layout::provider::LayoutProviderRegistry;
use crate::storage::backing_store::BackingStore;
use crate::storage::fs_backing_store::FsBackingStore;
use crate::storage::repository::{RemoteRepository, Repository, RepositoryType};
use crate::storage::transient_backing_store::TransientBackingStore;

/// storage-level scratch area for writes that are not committed yet
pub const TEMP_DIR: &str = ".temp";
/// storage-level area for deleted or overwritten artifacts, one subdirectory per repository
pub const TRASH_DIR: &str = ".trash";

/// A named group of repositories sharing one backing store. Repository `r` owns the keys
///  below `r/` in the store.
#[derive(Debug)]
pub struct Storage {
    pub id: String,
    store: Arc<dyn BackingStore>,
    repositories: BTreeMap<String, Arc<Repository>>,
}

impl Storage {
    pub fn new(id: &str, store: Arc<dyn BackingStore>) -> Storage {
        Storage {
            id: id.to_string(),
            store,
            repositories: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    /// a fresh key in the storage's scratch area
    pub fn temp_key(&self) -> String {
        format!("{}/{}", TEMP_DIR, Uuid::new_v4())
    }

    pub fn trash_key(&self, repository_id: &str, relative_path: &str) -> String {
        format!("{}/{}/{}", TRASH_DIR, repository_id, relative_path)
    }

    /// Writes a small file in one piece: readers see either the old content or the new one
    pub async fn write_atomic(&self, key: &str, data: Bytes) -> ArtifactResult<()> {
        let temp = self.temp_key();
        self.store.write_all(&temp, data).await?;
        if let Err(e) = self.store.move_entry(&temp, key).await {
            if let Err(cleanup) = self.store.delete(&temp).await {
                warn!("failed to remove temp file {}: {}", temp, cleanup);
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn add_repository(&mut self, repository: Repository) -> ArtifactResult<()> {
        check_id("repository", &repository.id)?;
        if self.repositories.contains_key(&repository.id) {
            return Err(ArtifactError::Configuration(format!("duplicate repository {}/{}", self.id, repository.id)));
        }
        self.repositories.insert(repository.id.clone(), Arc::new(repository));
        Ok(())
    }

    pub fn get_repository(&self, repository_id: &str) -> Option<Arc<Repository>> {
        self.repositories.get(repository_id).cloned()
    }

    pub fn repositories(&self) -> impl Iterator<Item = &Arc<Repository>> {
        self.repositories.values()
    }

    /// group members must exist in the same storage
    fn check_group_members(&self) -> ArtifactResult<()> {
        for repository in self.repositories.values() {
            for member in repository.members() {
                if !self.repositories.contains_key(member) {
                    return Err(ArtifactError::Configuration(format!(
                        "group {} references unknown member {:?}", repository.qualified_id(), member
                    )));
                }
            }
        }
        Ok(())
    }
}

/// ids become path segments in the backing store; leading '.' is reserved for `.temp`, `.trash`
///  and friends
fn check_id(kind: &str, id: &str) -> ArtifactResult<()> {
    if id.is_empty() || id.starts_with('.') || id.contains(['/', '\\', '\0']) {
        return Err(ArtifactError::Configuration(format!("invalid {} id {:?}", kind, id)));
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct StorageRegistry {
    storages: BTreeMap<String, Arc<Storage>>,
}

impl StorageRegistry {
    pub fn new() -> StorageRegistry {
        StorageRegistry::default()
    }

    /// Builds all storages and repositories from configuration. Every structural problem is
    ///  reported here rather than on first request.
    pub fn from_config(configs: &[StorageConfig], layouts: &LayoutProviderRegistry) -> ArtifactResult<StorageRegistry> {
        let mut result = StorageRegistry::new();
        for config in configs {
            let store: Arc<dyn BackingStore> = match &config.basedir {
                Some(basedir) => {
                    std::fs::create_dir_all(basedir)?;
                    Arc::new(FsBackingStore::new(basedir)?)
                }
                None => Arc::new(TransientBackingStore::new()),
            };

            let mut storage = Storage::new(&config.id, store);
            for repository_config in &config.repositories {
                storage.add_repository(repository_from_config(&config.id, repository_config, layouts)?)?;
            }
            info!("configured storage {} with {} repositories", storage.id, storage.repositories.len());
            result.add_storage(storage)?;
        }
        Ok(result)
    }

    pub fn add_storage(&mut self, storage: Storage) -> ArtifactResult<()> {
        check_id("storage", &storage.id)?;
        storage.check_group_members()?;
        if self.storages.contains_key(&storage.id) {
            return Err(ArtifactError::Configuration(format!("duplicate storage {}", storage.id)));
        }
        self.storages.insert(storage.id.clone(), Arc::new(storage));
        Ok(())
    }

    pub fn get_storage(&self, storage_id: &str) -> ArtifactResult<Arc<Storage>> {
        self.storages.get(storage_id)
            .cloned()
            .ok_or_else(|| ArtifactError::StorageNotFound(storage_id.to_string()))
    }

    pub fn get_repository(&self, storage_id: &str, repository_id: &str) -> ArtifactResult<(Arc<Storage>, Arc<Repository>)> {
        let storage = self.get_storage(storage_id)?;
        let repository = storage.get_repository(repository_id)
            .ok_or_else(|| ArtifactError::RepositoryNotFound {
                storage_id: storage_id.to_string(),
                repository_id: repository_id.to_string(),
            })?;
        Ok((storage, repository))
    }

    pub fn storages(&self) -> impl Iterator<Item = &Arc<Storage>> {
        self.storages.values()
    }
}

fn repository_from_config(storage_id: &str, config: &RepositoryConfig, layouts: &LayoutProviderRegistry) -> ArtifactResult<Repository> {
    let layout = layouts.require(&config.layout)?;

    let repository_type = match config.repository_type {
        RepositoryTypeConfig::Hosted => RepositoryType::Hosted,
        RepositoryTypeConfig::Proxy => {
            let remote = config.remote.as_ref()
                .ok_or_else(|| ArtifactError::Configuration(format!("proxy repository {}/{} has no remote", storage_id, config.id)))?;
            RepositoryType::Proxy(RemoteRepository::from(remote))
        }
        RepositoryTypeConfig::Group => {
            let mut seen = HashSet::new();
            for member in &config.members {
                if !seen.insert(member) {
                    return Err(ArtifactError::Configuration(format!("group {}/{} lists {} twice", storage_id, config.id, member)));
                }
            }
            RepositoryType::Group(config.members.clone())
        }
    };

    Ok(Repository {
        id: config.id.clone(),
        storage_id: storage_id.to_string(),
        layout,
        policy: config.policy.into(),
        repository_type,
        allows_redeployment: config.allows_redeployment,
        allows_delete: config.allows_delete,
        trash_enabled: config.trash_enabled,
        in_service: config.in_service,
    })
}

#[cfg(test)]
mod test {
    use rstest::*;

    use crate::config::AppConfig;
    use crate::layout::provider::LayoutProvider;
    use crate::storage::repository::RepositoryPolicy;

    use super::*;

    fn build(yaml: &str) -> ArtifactResult<StorageRegistry> {
        let config = AppConfig::from_yaml(yaml).unwrap();
        StorageRegistry::from_config(&config.storages, &LayoutProviderRegistry::with_defaults())
    }

    #[test]
    fn test_from_config() {
        let registry = build(r#"
storages:
  - id: storage0
    repositories:
      - { id: releases, layout: maven2, policy: release, trash_enabled: true }
      - { id: central, layout: maven2, type: proxy, remote: { url: "https://repo1.maven.org/maven2" } }
      - { id: public, layout: maven2, type: group, members: [releases, central] }
"#).unwrap();

        let (storage, releases) = registry.get_repository("storage0", "releases").unwrap();
        assert_eq!(storage.id, "storage0");
        assert_eq!(releases.layout, LayoutProvider::Maven);
        assert_eq!(releases.policy, RepositoryPolicy::Release);
        assert!(releases.trash_enabled);

        let (_, central) = registry.get_repository("storage0", "central").unwrap();
        assert_eq!(central.remote().map(|r| r.url.as_str()), Some("https://repo1.maven.org/maven2"));

        let (_, public) = registry.get_repository("storage0", "public").unwrap();
        assert_eq!(public.members(), &["releases".to_string(), "central".to_string()]);
    }

    #[test]
    fn test_lookup_errors() {
        let registry = build("storages: [ { id: storage0, repositories: [ { id: releases, layout: raw } ] } ]").unwrap();
        assert!(matches!(registry.get_storage("nope"), Err(ArtifactError::StorageNotFound(_))));
        assert!(matches!(registry.get_repository("storage0", "nope"), Err(ArtifactError::RepositoryNotFound { .. })));
    }

    #[rstest]
    #[case::unknown_layout("storages: [ { id: s, repositories: [ { id: r, layout: ivy } ] } ]")]
    #[case::duplicate_repository("storages: [ { id: s, repositories: [ { id: r, layout: raw }, { id: r, layout: npm } ] } ]")]
    #[case::duplicate_storage("storages: [ { id: s }, { id: s } ]")]
    #[case::reserved_repository_id("storages: [ { id: s, repositories: [ { id: .trash, layout: raw } ] } ]")]
    #[case::reserved_storage_id("storages: [ { id: .s } ]")]
    #[case::proxy_without_remote("storages: [ { id: s, repositories: [ { id: r, layout: raw, type: proxy } ] } ]")]
    #[case::unknown_member("storages: [ { id: s, repositories: [ { id: g, layout: raw, type: group, members: [x] } ] } ]")]
    #[case::duplicate_member("storages: [ { id: s, repositories: [ { id: r, layout: raw }, { id: g, layout: raw, type: group, members: [r, r] } ] } ]")]
    fn test_invalid_config(#[case] yaml: &str) {
        assert!(matches!(build(yaml), Err(ArtifactError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_write_atomic() {
        let storage = Storage::new("storage0", Arc::new(TransientBackingStore::new()));
        storage.write_atomic("repo/a.txt", Bytes::from_static(b"first")).await.unwrap();
        storage.write_atomic("repo/a.txt", Bytes::from_static(b"second")).await.unwrap();

        assert_eq!(storage.store().read_all("repo/a.txt").await.unwrap(), Some(b"second".to_vec()));
        assert!(storage.store().list_children(TEMP_DIR).await.unwrap().is_empty());
        assert_eq!(storage.trash_key("repo", "a/b.jar"), ".trash/repo/a/b.jar");
    }

    #[test]
    fn test_filesystem_storage() {
        let dir = tempfile::tempdir().unwrap();
        let basedir = dir.path().join("storage0");
        let yaml = format!("storages: [ {{ id: storage0, basedir: {:?}, repositories: [ {{ id: r, layout: raw }} ] }} ]", basedir);
        build(&yaml).unwrap();
        assert!(basedir.is_dir());
    }
}
