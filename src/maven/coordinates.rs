use std::fmt::{Display, Formatter};

pub const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

/// A timestamped ("unique") snapshot build, e.g. `20240101.120000-3`
#[derive(Debug, Eq, PartialEq, Clone, Hash, PartialOrd, Ord)]
pub struct SnapshotBuild {
    pub timestamp: String, // yyyyMMdd.HHmmss
    pub build_number: u32,
}

#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub enum MavenVersion {
    Release(String),
    Snapshot {
        version: String, // ending in '-SNAPSHOT'
        build: Option<SnapshotBuild>,
    }
}

impl MavenVersion {
    pub fn is_snapshot(&self) -> bool {
        matches!(self, MavenVersion::Snapshot { .. })
    }

    /// The version as it appears in the directory name, e.g. `1.0-SNAPSHOT`
    pub fn base_version(&self) -> &str {
        match self {
            MavenVersion::Release(v) => v,
            MavenVersion::Snapshot { version, .. } => version,
        }
    }

    /// The version as it appears in the file name, e.g. `1.0-20240101.120000-3` for a unique
    ///  snapshot
    pub fn file_version(&self) -> String {
        match self {
            MavenVersion::Release(v) => v.clone(),
            MavenVersion::Snapshot { version, build: None } => version.clone(),
            MavenVersion::Snapshot { version, build: Some(build) } => format!(
                "{}-{}-{}",
                &version[..version.len() - SNAPSHOT_SUFFIX.len()],
                build.timestamp,
                build.build_number,
            ),
        }
    }

    /// Maven only treats the upper case suffix as a snapshot marker
    pub fn parse_base_version(version: &str) -> MavenVersion {
        if version.ends_with(SNAPSHOT_SUFFIX) {
            MavenVersion::Snapshot { version: version.to_string(), build: None }
        }
        else {
            MavenVersion::Release(version.to_string())
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenArtifactId(pub String);

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenGroupId(pub String);

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenCoordinates {
    pub group_id: MavenGroupId,
    pub artifact_id: MavenArtifactId,
    pub version: MavenVersion,
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub enum MavenClassifier {
    Unclassified,
    Classified(String),
}

impl MavenClassifier {
    pub fn as_option(&self) -> Option<&str> {
        match self {
            MavenClassifier::Unclassified => None,
            MavenClassifier::Classified(c) => Some(c),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct MavenArtifactRef {
    pub coordinates: MavenCoordinates,
    pub classifier: MavenClassifier,
    pub file_extension: String, // including leading '.', e.g. ".jar"
}

impl MavenArtifactRef {
    /// extension without the leading '.'
    pub fn extension(&self) -> &str {
        self.file_extension.strip_prefix('.').unwrap_or(&self.file_extension)
    }

    /// `groupId:artifactId:extension[:classifier]:version`
    pub fn id(&self) -> String {
        let mut result = format!("{}:{}:{}", self.coordinates.group_id.0, self.coordinates.artifact_id.0, self.extension());
        if let MavenClassifier::Classified(c) = &self.classifier {
            result.push(':');
            result.push_str(c);
        }
        result.push(':');
        result.push_str(&self.coordinates.version.file_version());
        result
    }
}

impl Display for MavenArtifactRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id())
    }
}
