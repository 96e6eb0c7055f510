use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::checksum::algorithm::DigestAlgorithm;
use crate::coordinates::*;
use crate::error::{ArtifactError, ArtifactResult, CoordinateParseError};
use crate::maven::coordinates::MavenArtifactRef;
use crate::maven::metadata_xml::METADATA_FILE_NAME;

/// The packaging formats the engine knows about. Each one owns the coordinate and path rules
///  of repositories declaring its alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayoutProvider {
    Maven,
    Npm,
    Nuget,
    Pypi,
    Rpm,
    Docker,
    P2,
    Raw,
}

/// What a path inside a repository refers to, as far as its layout can tell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathKind<'a> {
    /// sidecar digest file; carries the path of the file it describes
    Checksum(DigestAlgorithm, &'a str),
    Metadata,
    Artifact,
}

impl LayoutProvider {
    pub const ALL: [LayoutProvider; 8] = [
        LayoutProvider::Maven,
        LayoutProvider::Npm,
        LayoutProvider::Nuget,
        LayoutProvider::Pypi,
        LayoutProvider::Rpm,
        LayoutProvider::Docker,
        LayoutProvider::P2,
        LayoutProvider::Raw,
    ];

    pub fn alias(&self) -> &'static str {
        match self {
            LayoutProvider::Maven => crate::maven::paths::LAYOUT_NAME,
            LayoutProvider::Npm => npm::LAYOUT_NAME,
            LayoutProvider::Nuget => nuget::LAYOUT_NAME,
            LayoutProvider::Pypi => pypi::LAYOUT_NAME,
            LayoutProvider::Rpm => rpm::LAYOUT_NAME,
            LayoutProvider::Docker => docker::LAYOUT_NAME,
            LayoutProvider::P2 => p2::LAYOUT_NAME,
            LayoutProvider::Raw => raw::LAYOUT_NAME,
        }
    }

    /// the sidecar checksum files every artifact in a repository of this layout carries
    pub fn digest_algorithms(&self) -> &'static [DigestAlgorithm] {
        use DigestAlgorithm::*;

        match self {
            LayoutProvider::Maven => &[Md5, Sha1],
            LayoutProvider::Npm => &[Sha1, Sha512],
            LayoutProvider::Nuget => &[Sha512],
            LayoutProvider::Pypi => &[Md5, Sha256],
            LayoutProvider::Rpm => &[Sha256],
            LayoutProvider::Docker => &[Sha256],
            LayoutProvider::P2 => &[Md5, Sha1],
            LayoutProvider::Raw => &[Md5, Sha1],
        }
    }

    pub fn coordinates_from_path(&self, path: &str) -> Result<ArtifactCoordinates, CoordinateParseError> {
        Ok(match self {
            LayoutProvider::Maven => ArtifactCoordinates::Maven(MavenArtifactRef::from_path(path)?),
            LayoutProvider::Npm => ArtifactCoordinates::Npm(NpmCoordinates::from_path(path)?),
            LayoutProvider::Nuget => ArtifactCoordinates::Nuget(NugetCoordinates::from_path(path)?),
            LayoutProvider::Pypi => ArtifactCoordinates::Pypi(PypiCoordinates::from_path(path)?),
            LayoutProvider::Rpm => ArtifactCoordinates::Rpm(RpmCoordinates::from_path(path)?),
            LayoutProvider::Docker => ArtifactCoordinates::Docker(DockerCoordinates::from_path(path)?),
            LayoutProvider::P2 => ArtifactCoordinates::P2(P2Coordinates::from_path(path)?),
            LayoutProvider::Raw => ArtifactCoordinates::Raw(RawCoordinates::from_path(path)?),
        })
    }

    /// fails for coordinates of a different format
    pub fn coordinates_to_path(&self, coordinates: &ArtifactCoordinates) -> Result<String, CoordinateParseError> {
        if self.layout_of(coordinates) != *self {
            return Err(CoordinateParseError::new(self.alias(), &coordinates.to_path(), "coordinates belong to a different layout"));
        }
        Ok(coordinates.to_path())
    }

    fn layout_of(&self, coordinates: &ArtifactCoordinates) -> LayoutProvider {
        match coordinates {
            ArtifactCoordinates::Maven(_) => LayoutProvider::Maven,
            ArtifactCoordinates::Npm(_) => LayoutProvider::Npm,
            ArtifactCoordinates::Nuget(_) => LayoutProvider::Nuget,
            ArtifactCoordinates::Pypi(_) => LayoutProvider::Pypi,
            ArtifactCoordinates::Rpm(_) => LayoutProvider::Rpm,
            ArtifactCoordinates::Docker(_) => LayoutProvider::Docker,
            ArtifactCoordinates::P2(_) => LayoutProvider::P2,
            ArtifactCoordinates::Raw(_) => LayoutProvider::Raw,
        }
    }

    pub fn is_checksum(&self, path: &str) -> bool {
        DigestAlgorithm::split_sidecar_path(path).is_some()
    }

    pub fn is_metadata(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        match self {
            LayoutProvider::Maven => file_name == METADATA_FILE_NAME,
            LayoutProvider::Npm => file_name == "package.json",
            LayoutProvider::Nuget => file_name.ends_with(".nuspec"),
            _ => false,
        }
    }

    pub fn classify<'a>(&self, path: &'a str) -> PathKind<'a> {
        if let Some((algorithm, artifact_path)) = DigestAlgorithm::split_sidecar_path(path) {
            PathKind::Checksum(algorithm, artifact_path)
        }
        else if self.is_metadata(path) {
            PathKind::Metadata
        }
        else {
            PathKind::Artifact
        }
    }

    /// whether deploys trigger a rebuild of per-artifact version metadata
    pub fn supports_metadata_merge(&self) -> bool {
        matches!(self, LayoutProvider::Maven)
    }
}

impl Display for LayoutProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.alias())
    }
}

/// Layout providers by alias. Built once at startup and handed to everything that resolves a
///  repository's layout.
#[derive(Debug, Clone, Default)]
pub struct LayoutProviderRegistry {
    providers: BTreeMap<String, LayoutProvider>,
}

impl LayoutProviderRegistry {
    pub fn new() -> LayoutProviderRegistry {
        LayoutProviderRegistry::default()
    }

    pub fn with_defaults() -> LayoutProviderRegistry {
        let mut result = LayoutProviderRegistry::new();
        for provider in LayoutProvider::ALL {
            result.register(provider);
        }
        result
    }

    pub fn register(&mut self, provider: LayoutProvider) {
        self.providers.insert(provider.alias().to_string(), provider);
    }

    pub fn get(&self, alias: &str) -> Option<LayoutProvider> {
        self.providers.get(alias).copied()
    }

    /// lookup for configuration time: an unknown alias is fatal
    pub fn require(&self, alias: &str) -> ArtifactResult<LayoutProvider> {
        self.get(alias)
            .ok_or_else(|| ArtifactError::Configuration(format!("unsupported layout {:?}", alias)))
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|k| k.as_str())
    }
}
