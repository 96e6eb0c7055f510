//! Format specific artifact identities and their conversion from and to repository paths.
//!
//! Every format implements [`Coordinates`]; [`ArtifactCoordinates`] is the closed set of all
//!  of them. For any path `p` a format accepts, `to_path(from_path(p)) == p`.

pub mod docker;
pub mod npm;
pub mod nuget;
pub mod p2;
pub mod pypi;
pub mod raw;
pub mod rpm;

use std::fmt::{Display, Formatter};

use crate::error::CoordinateParseError;
use crate::maven::coordinates::MavenArtifactRef;
use crate::maven::paths::{as_maven_path, parse_maven_path};

pub use docker::{DockerCoordinates, DockerObjectKind};
pub use npm::NpmCoordinates;
pub use nuget::NugetCoordinates;
pub use p2::P2Coordinates;
pub use pypi::{PypiCoordinates, PypiPackaging};
pub use raw::RawCoordinates;
pub use rpm::RpmCoordinates;

pub trait Coordinates: Sized {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError>;

    fn to_path(&self) -> String;

    /// human readable identity, e.g. `com.example:lib:jar:1.0` or `@scope/name@1.0.0`
    fn id(&self) -> String;

    fn version(&self) -> Option<&str>;

    /// the named coordinate fields, in their canonical order
    fn fields(&self) -> Vec<(&'static str, Option<String>)>;
}

impl Coordinates for MavenArtifactRef {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        parse_maven_path(path)
    }

    fn to_path(&self) -> String {
        as_maven_path(self)
    }

    fn id(&self) -> String {
        MavenArtifactRef::id(self)
    }

    fn version(&self) -> Option<&str> {
        Some(self.coordinates.version.base_version())
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("groupId", Some(self.coordinates.group_id.0.clone())),
            ("artifactId", Some(self.coordinates.artifact_id.0.clone())),
            ("version", Some(self.coordinates.version.file_version())),
            ("classifier", self.classifier.as_option().map(|c| c.to_string())),
            ("extension", Some(self.extension().to_string())),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactCoordinates {
    Maven(MavenArtifactRef),
    Npm(NpmCoordinates),
    Nuget(NugetCoordinates),
    Pypi(PypiCoordinates),
    Rpm(RpmCoordinates),
    Docker(DockerCoordinates),
    P2(P2Coordinates),
    Raw(RawCoordinates),
}

macro_rules! dispatch {
    ($self:ident, $c:ident => $e:expr) => {
        match $self {
            ArtifactCoordinates::Maven($c) => $e,
            ArtifactCoordinates::Npm($c) => $e,
            ArtifactCoordinates::Nuget($c) => $e,
            ArtifactCoordinates::Pypi($c) => $e,
            ArtifactCoordinates::Rpm($c) => $e,
            ArtifactCoordinates::Docker($c) => $e,
            ArtifactCoordinates::P2($c) => $e,
            ArtifactCoordinates::Raw($c) => $e,
        }
    };
}

impl ArtifactCoordinates {
    pub fn to_path(&self) -> String {
        dispatch!(self, c => c.to_path())
    }

    pub fn id(&self) -> String {
        dispatch!(self, c => c.id())
    }

    pub fn version(&self) -> Option<&str> {
        dispatch!(self, c => c.version())
    }

    pub fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        dispatch!(self, c => c.fields())
    }

    /// value of a single named field, `None` if the field is absent or unknown
    pub fn field(&self, name: &str) -> Option<String> {
        self.fields().into_iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, v)| v)
    }

    pub fn as_maven(&self) -> Option<&MavenArtifactRef> {
        match self {
            ArtifactCoordinates::Maven(m) => Some(m),
            _ => None,
        }
    }
}

impl Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}

/// shared check for formats whose paths are a fixed number of '/' separated segments
pub(crate) fn split_segments<'a>(layout: &'static str, path: &'a str, expected: usize, shape: &str) -> Result<Vec<&'a str>, CoordinateParseError> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() != expected || segments.iter().any(|s| s.is_empty()) {
        return Err(CoordinateParseError::new(layout, path, format!("expected {}", shape)));
    }
    Ok(segments)
}
