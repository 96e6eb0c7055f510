use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use axum::{Json, Router, Server};
use axum::body::StreamBody;
use axum::extract::{BodyStream, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use arti_store::checksum::algorithm::DigestAlgorithm;
use arti_store::checksum::cache::ChecksumCache;
use arti_store::config::AppConfig;
use arti_store::error::{ArtifactError, ValidationError};
use arti_store::layout::provider::LayoutProviderRegistry;
use arti_store::remote::http_fetcher::HttpFetcher;
use arti_store::resolution::{ArtifactResolutionService, RetryPolicy};
use arti_store::storage::registry::StorageRegistry;

struct AppState {
    service: ArtifactResolutionService,
    shutdown: CancellationToken,
}

type SharedState = Arc<AppState>;

struct ApiError(ArtifactError);

impl From<ArtifactError> for ApiError {
    fn from(e: ArtifactError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ArtifactError::StorageNotFound(_)
            | ArtifactError::RepositoryNotFound { .. }
            | ArtifactError::NotFound(_) => StatusCode::NOT_FOUND,
            ArtifactError::InvalidPath { .. }
            | ArtifactError::CoordinateParse(_) => StatusCode::BAD_REQUEST,
            ArtifactError::Validation(_)
            | ArtifactError::ChecksumMismatch { .. } => StatusCode::CONFLICT,
            ArtifactError::Transport(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        }
        else {
            warn!("request rejected: {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// `X-Checksum-<Algorithm>` request headers the client wants the upload checked against
fn expected_checksums(headers: &HeaderMap) -> Result<BTreeMap<DigestAlgorithm, String>, ApiError> {
    let mut result = BTreeMap::new();
    for algorithm in DigestAlgorithm::ALL {
        let Some(value) = headers.get(format!("x-checksum-{}", algorithm.extension())) else {
            continue;
        };
        let digest = value.to_str().ok()
            .and_then(|v| algorithm.parse_sidecar_content(v))
            .ok_or_else(|| ArtifactError::from(ValidationError::new("checksum", format!("malformed {} header", algorithm))))?;
        result.insert(algorithm, digest);
    }
    Ok(result)
}

async fn get_artifact(
    State(state): State<SharedState>,
    Path((storage, repository, path)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    // dropping the request future aborts the fetch just the same, this covers server shutdown
    let cancel = state.shutdown.child_token();
    let stream = state.service.get_input_stream(&storage, &repository, &path, &cancel).await?;
    Ok(StreamBody::new(stream).into_response())
}

async fn put_artifact(
    State(state): State<SharedState>,
    Path((storage, repository, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: BodyStream,
) -> Result<Response, ApiError> {
    let expected = expected_checksums(&headers)?;
    let data = body.map(|chunk| chunk.map_err(|e| ArtifactError::Transport(format!("reading request body: {}", e))));

    let stored = state.service.store(&storage, &repository, &path, Box::pin(data), expected).await?;
    let checksums: BTreeMap<&str, &str> = stored.checksums.iter()
        .map(|(algorithm, digest)| (algorithm.extension(), digest.as_str()))
        .collect();
    let body = json!({
        "path": stored.path.to_string(),
        "id": stored.coordinates.map(|c| c.id()),
        "length": stored.length,
        "checksums": checksums,
    });
    Ok((StatusCode::CREATED, Json(body)).into_response())
}

async fn delete_artifact(
    State(state): State<SharedState>,
    Path((storage, repository, path)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.delete(&storage, &repository, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn undelete_artifact(
    State(state): State<SharedState>,
    Path((storage, repository, path)): Path<(String, String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.undelete(&storage, &repository, &path).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn empty_trash(
    State(state): State<SharedState>,
    Path((storage, repository)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state.service.empty_trash(&storage, &repository).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn configure_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    configure_logging();

    let config = AppConfig::load()?;
    let storages = StorageRegistry::from_config(&config.storages, &LayoutProviderRegistry::with_defaults())
        .context("invalid storage configuration")?;

    let shutdown = CancellationToken::new();
    let checksums = Arc::new(ChecksumCache::new(config.checksum_cache.lifetime()));
    let sweeper = checksums.spawn_sweeper(config.checksum_cache.sweep_interval(), shutdown.clone());

    let service = ArtifactResolutionService::new(
        Arc::new(storages),
        checksums,
        Arc::new(HttpFetcher::new(&config.remote)),
    )
        .with_retry(RetryPolicy::from(&config.remote));

    let state = Arc::new(AppState {
        service,
        shutdown: shutdown.clone(),
    });

    let app = Router::new()
        .route("/storages/:storage/:repository/*path", get(get_artifact).put(put_artifact).delete(delete_artifact))
        .route("/trash/:storage/:repository/*path", post(undelete_artifact))
        .route("/trash/:storage/:repository", delete(empty_trash))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    let addr = SocketAddr::from_str(&config.server.bind)
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;
    info!("serving {}", addr);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("shutting down");
    shutdown.cancel();
    sweeper.await?;
    Ok(())
}
