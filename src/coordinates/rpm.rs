use lazy_static::lazy_static;
use regex::Regex;

use crate::coordinates::Coordinates;
use crate::error::CoordinateParseError;

pub const LAYOUT_NAME: &str = "rpm";

lazy_static! {
    // name may contain '-', version and release may not; the architecture is the last
    //  '.' separated part before the extension
    static ref RPM_FILE_NAME_REGEX: Regex = Regex::new(
        r"^(?P<name>[A-Za-z0-9_+.][A-Za-z0-9_+.-]*)-(?P<version>[A-Za-z0-9_+.~^]+)-(?P<release>[A-Za-z0-9_+.~^]+)\.(?P<arch>[A-Za-z0-9_]+)\.(?P<extension>rpm)$"
    ).unwrap();
}

/// `[directory/]name-version-release.arch.rpm`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RpmCoordinates {
    pub directory: Option<String>,
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
    pub extension: String,
}

impl RpmCoordinates {
    pub fn is_source_package(&self) -> bool {
        self.arch == "src"
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}-{}.{}.{}", self.name, self.version, self.release, self.arch, self.extension)
    }
}

impl Coordinates for RpmCoordinates {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        let (directory, file_name) = match path.rsplit_once('/') {
            Some((directory, file_name)) => (Some(directory), file_name),
            None => (None, path),
        };
        if directory.map(|d| d.split('/').any(|s| s.is_empty())).unwrap_or(false) {
            return Err(CoordinateParseError::new(LAYOUT_NAME, path, "empty path segment"));
        }

        let captures = RPM_FILE_NAME_REGEX.captures(file_name)
            .ok_or_else(|| CoordinateParseError::new(LAYOUT_NAME, path, "expected <name>-<version>-<release>.<arch>.rpm"))?;
        let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string()).unwrap_or_default();

        Ok(RpmCoordinates {
            directory: directory.map(|d| d.to_string()),
            name: group("name"),
            version: group("version"),
            release: group("release"),
            arch: group("arch"),
            extension: group("extension"),
        })
    }

    fn to_path(&self) -> String {
        match &self.directory {
            Some(directory) => format!("{}/{}", directory, self.file_name()),
            None => self.file_name(),
        }
    }

    fn id(&self) -> String {
        format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch)
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("name", Some(self.name.clone())),
            ("version", Some(self.version.clone())),
            ("release", Some(self.release.clone())),
            ("arch", Some(self.arch.clone())),
            ("extension", Some(self.extension.clone())),
        ]
    }
}
