use std::fmt::Debug;

use crate::coordinates::ArtifactCoordinates;
use crate::path::RepositoryPath;

/// Notified after an artifact change is committed, e.g. by a search indexer. Calls happen on
///  the request's task, so implementations hand off anything slow.
pub trait ArtifactEventListener: Debug + Send + Sync {
    fn on_artifact_stored(&self, coordinates: &ArtifactCoordinates, path: &RepositoryPath);

    fn on_artifact_deleted(&self, path: &RepositoryPath);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventListener;

impl ArtifactEventListener for NoopEventListener {
    fn on_artifact_stored(&self, _coordinates: &ArtifactCoordinates, _path: &RepositoryPath) {}

    fn on_artifact_deleted(&self, _path: &RepositoryPath) {}
}
