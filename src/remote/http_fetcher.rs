use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::StreamExt;
use hyper::{Body, Client, HeaderMap, Request, StatusCode, Uri};
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, USER_AGENT};
use hyper_tls::HttpsConnector;
use tracing::{debug, trace};

use crate::checksum::algorithm::DigestAlgorithm;
use crate::config::RemoteConfig;
use crate::error::{ArtifactError, ArtifactResult};
use crate::remote::{artifact_url, RemoteArtifact, RemoteFetcher};
use crate::storage::repository::{Credentials, RemoteRepository};

/// Fetches files from remote repositories over HTTP(S), collecting the checksums the server
///  announces in its response headers.
///
/// Instances do HTTP connection caching internally, so keeping them alive has performance benefits.
pub struct HttpFetcher {
    client: Client<HttpsConnector<HttpConnector>>,
    read_timeout: Duration,
    user_agent: String,
}

impl HttpFetcher {
    pub fn new(config: &RemoteConfig) -> HttpFetcher {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(config.connect_timeout()));

        HttpFetcher {
            client: Client::builder()
                .build::<_, Body>(HttpsConnector::new_with_connector(http)),
            read_timeout: config.read_timeout(),
            // Maven Central returns a 403 without a user agent
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Debug for HttpFetcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("read_timeout", &self.read_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn basic_auth(credentials: &Credentials) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", credentials.username, credentials.password)))
}

/// Checksums from the headers various repository servers use. An etag only counts if it
///  looks like a SHA-1, anything malformed is ignored rather than failing the download.
fn checksums_from_headers(headers: &HeaderMap) -> BTreeMap<DigestAlgorithm, String> {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    let candidates = [
        (DigestAlgorithm::Sha1, header("x-checksum-sha1").or_else(|| header("x-goog-meta-checksum-sha1"))),
        (DigestAlgorithm::Sha1, header("etag").map(|s| s.trim_start_matches("W/").trim_matches('"'))),
        (DigestAlgorithm::Md5, header("x-checksum-md5").or_else(|| header("x-goog-meta-checksum-md5"))),
        (DigestAlgorithm::Sha256, header("x-checksum-sha256")),
    ];

    let mut result = BTreeMap::new();
    for (algorithm, value) in candidates {
        if result.contains_key(&algorithm) {
            continue;
        }
        if let Some(digest) = value.and_then(|v| algorithm.parse_sidecar_content(v)) {
            result.insert(algorithm, digest);
        }
    }
    result
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, remote: &RemoteRepository, path: &str) -> ArtifactResult<RemoteArtifact> {
        let url = artifact_url(remote, path);
        let uri = Uri::try_from(url.clone())
            .map_err(|e| ArtifactError::Configuration(format!("invalid remote URL {}: {}", url, e)))?;

        let mut request = Request::builder()
            .method("GET")
            .uri(uri)
            .header(USER_AGENT, &self.user_agent);
        if let Some(credentials) = &remote.credentials {
            request = request.header(AUTHORIZATION, basic_auth(credentials));
        }
        let request = request.body(Body::empty())
            .map_err(|e| ArtifactError::Transport(e.to_string()))?;

        trace!("getting {}", url);

        let response = tokio::time::timeout(self.read_timeout, self.client.request(request)).await
            .map_err(|_| ArtifactError::Transport(format!("timed out waiting for {}", url)))??;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                debug!("{} not found upstream", url);
                return Err(ArtifactError::NotFound(url));
            }
            s => return Err(ArtifactError::Transport(format!("{} returned {}", url, s))),
        }

        let checksums = checksums_from_headers(response.headers());
        trace!("upstream checksums for {}: {:?}", url, checksums);

        let read_timeout = self.read_timeout;
        let body = response.into_body();
        let data = futures::stream::unfold(Some(body), move |body| async move {
            let mut body = body?;
            match tokio::time::timeout(read_timeout, body.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
                Ok(Some(Err(e))) => Some((Err(ArtifactError::from(e)), None)),
                Ok(None) => None,
                Err(_) => Some((Err(ArtifactError::Transport("timed out reading response body".to_string())), None)),
            }
        });

        Ok(RemoteArtifact {
            data: Box::pin(data),
            checksums,
        })
    }
}
