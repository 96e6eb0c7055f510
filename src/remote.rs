pub mod http_fetcher;
pub mod transient_fetcher;

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::checksum::algorithm::DigestAlgorithm;
use crate::checksum::digesting_stream::ByteStream;
use crate::error::ArtifactResult;
use crate::storage::repository::RemoteRepository;

pub use http_fetcher::HttpFetcher;
pub use transient_fetcher::TransientFetcher;

/// A file as served by a remote repository. `checksums` holds the digests the remote announced
///  for it; the caller checks them while storing `data`.
pub struct RemoteArtifact {
    pub data: ByteStream,
    pub checksums: BTreeMap<DigestAlgorithm, String>,
}

/// Access to the upstream of proxy repositories
#[async_trait]
pub trait RemoteFetcher: Debug + Send + Sync {
    /// `ArtifactError::NotFound` if the remote does not have the file, `ArtifactError::Transport`
    ///  for everything that may go away on retry
    async fn fetch(&self, remote: &RemoteRepository, path: &str) -> ArtifactResult<RemoteArtifact>;
}

pub fn artifact_url(remote: &RemoteRepository, path: &str) -> String {
    format!("{}/{}", remote.url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_artifact_url() {
        let remote = RemoteRepository { url: "https://repo1.maven.org/maven2/".to_string(), credentials: None };
        assert_eq!(artifact_url(&remote, "com/example/lib/1.0/lib-1.0.jar"), "https://repo1.maven.org/maven2/com/example/lib/1.0/lib-1.0.jar");

        let remote = RemoteRepository { url: "https://registry.example.org".to_string(), credentials: None };
        assert_eq!(artifact_url(&remote, "a/b"), "https://registry.example.org/a/b");
    }
}
