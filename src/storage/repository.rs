use std::fmt::{Debug, Formatter};

use crate::config::{PolicyConfig, RemoteRepositoryConfig};
use crate::layout::provider::LayoutProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryPolicy {
    Release,
    Snapshot,
    Mixed,
}

impl From<PolicyConfig> for RepositoryPolicy {
    fn from(value: PolicyConfig) -> Self {
        match value {
            PolicyConfig::Release => RepositoryPolicy::Release,
            PolicyConfig::Snapshot => RepositoryPolicy::Snapshot,
            PolicyConfig::Mixed => RepositoryPolicy::Mixed,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub url: String,
    pub credentials: Option<Credentials>,
}

impl From<&RemoteRepositoryConfig> for RemoteRepository {
    fn from(value: &RemoteRepositoryConfig) -> Self {
        let credentials = match (&value.username, &value.password) {
            (Some(username), password) => Some(Credentials {
                username: username.clone(),
                password: password.clone().unwrap_or_default(),
            }),
            (None, _) => None,
        };
        RemoteRepository {
            url: value.url.clone(),
            credentials,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryType {
    Hosted,
    Proxy(RemoteRepository),
    /// member repository ids in the same storage, in resolution order
    Group(Vec<String>),
}

/// A named, single-layout collection of artifacts inside a storage
#[derive(Debug, Clone)]
pub struct Repository {
    pub id: String,
    pub storage_id: String,
    pub layout: LayoutProvider,
    pub policy: RepositoryPolicy,
    pub repository_type: RepositoryType,
    pub allows_redeployment: bool,
    pub allows_delete: bool,
    pub trash_enabled: bool,
    pub in_service: bool,
}

impl Repository {
    pub fn new(storage_id: &str, id: &str, layout: LayoutProvider) -> Repository {
        Repository {
            id: id.to_string(),
            storage_id: storage_id.to_string(),
            layout,
            policy: RepositoryPolicy::Mixed,
            repository_type: RepositoryType::Hosted,
            allows_redeployment: false,
            allows_delete: true,
            trash_enabled: false,
            in_service: true,
        }
    }

    pub fn with_policy(mut self, policy: RepositoryPolicy) -> Repository {
        self.policy = policy;
        self
    }

    pub fn with_type(mut self, repository_type: RepositoryType) -> Repository {
        self.repository_type = repository_type;
        self
    }

    pub fn with_redeployment(mut self, allows_redeployment: bool) -> Repository {
        self.allows_redeployment = allows_redeployment;
        self
    }

    pub fn with_trash(mut self, trash_enabled: bool) -> Repository {
        self.trash_enabled = trash_enabled;
        self
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self.repository_type, RepositoryType::Hosted)
    }

    pub fn remote(&self) -> Option<&RemoteRepository> {
        match &self.repository_type {
            RepositoryType::Proxy(remote) => Some(remote),
            _ => None,
        }
    }

    pub fn members(&self) -> &[String] {
        match &self.repository_type {
            RepositoryType::Group(members) => members,
            _ => &[],
        }
    }

    /// `storage/repository`, for log messages and cache keys
    pub fn qualified_id(&self) -> String {
        format!("{}/{}", self.storage_id, self.id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_remote_from_config() {
        let remote = RemoteRepository::from(&RemoteRepositoryConfig {
            url: "https://example.org/repo".to_string(),
            username: Some("deployer".to_string()),
            password: None,
        });
        assert_eq!(remote.credentials.as_ref().map(|c| c.username.as_str()), Some("deployer"));
        assert_eq!(remote.credentials.as_ref().map(|c| c.password.as_str()), Some(""));
        assert!(!format!("{:?}", remote).contains("password: \"\""));
    }

    #[test]
    fn test_builders() {
        let repository = Repository::new("storage0", "releases", LayoutProvider::Maven)
            .with_policy(RepositoryPolicy::Release)
            .with_trash(true);
        assert!(repository.is_hosted());
        assert!(repository.trash_enabled);
        assert!(repository.members().is_empty());
        assert_eq!(repository.qualified_id(), "storage0/releases");
    }
}
