use thiserror::Error;

use crate::checksum::algorithm::DigestAlgorithm;

/// A path that does not match the shape a layout expects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{layout}: not a valid artifact path {path:?}: {reason}")]
pub struct CoordinateParseError {
    pub layout: &'static str,
    pub path: String,
    pub reason: String,
}
impl CoordinateParseError {
    pub fn new(layout: &'static str, path: &str, reason: impl Into<String>) -> CoordinateParseError {
        CoordinateParseError {
            layout,
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// Coordinates parsed fine, but a repository policy rejects them
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("rejected by {validator}: {reason}")]
pub struct ValidationError {
    pub validator: String,
    pub reason: String,
}
impl ValidationError {
    pub fn new(validator: impl Into<String>, reason: impl Into<String>) -> ValidationError {
        ValidationError {
            validator: validator.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("storage not found: {0}")]
    StorageNotFound(String),

    #[error("repository not found: {storage_id}/{repository_id}")]
    RepositoryNotFound {
        storage_id: String,
        repository_id: String,
    },

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        path: String,
        reason: &'static str,
    },

    #[error(transparent)]
    CoordinateParse(#[from] CoordinateParseError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{algorithm} checksum mismatch for {path}: expected {expected}, computed {actual}")]
    ChecksumMismatch {
        path: String,
        algorithm: DigestAlgorithm,
        expected: String,
        actual: String,
    },

    #[error("remote transport error: {0}")]
    Transport(String),

    #[error("storage I/O error: {0}")]
    StorageIo(#[from] std::io::Error),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ArtifactError {
    pub fn invalid_path(path: &str, reason: &'static str) -> ArtifactError {
        ArtifactError::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }

    /// Only transport failures are worth another attempt - everything else is structural
    pub fn is_retryable(&self) -> bool {
        matches!(self, ArtifactError::Transport(_))
    }
}

impl From<hyper::Error> for ArtifactError {
    fn from(e: hyper::Error) -> Self {
        ArtifactError::Transport(e.to_string())
    }
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;
