use lazy_static::lazy_static;
use regex::Regex;

use crate::coordinates::Coordinates;
use crate::error::CoordinateParseError;

pub const LAYOUT_NAME: &str = "npm";

lazy_static! {
    static ref NAME_REGEX: Regex = Regex::new(r"^[a-z0-9~][a-z0-9._~-]*$").unwrap();
}

/// `[@scope/]name/version/name-version.tgz` for the package tarball, `.../package.json` for
///  the version's manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NpmCoordinates {
    pub scope: Option<String>, // without the leading '@'
    pub name: String,
    pub version: String,
    pub extension: String, // "tgz" or "json"
}

impl NpmCoordinates {
    pub fn new(scope: Option<&str>, name: &str, version: &str, extension: &str) -> NpmCoordinates {
        NpmCoordinates {
            scope: scope.map(|s| s.to_string()),
            name: name.to_string(),
            version: version.to_string(),
            extension: extension.to_string(),
        }
    }

    fn file_name(&self) -> String {
        match self.extension.as_str() {
            "json" => "package.json".to_string(),
            ext => format!("{}-{}.{}", self.name, self.version, ext),
        }
    }
}

impl Coordinates for NpmCoordinates {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        let err = |reason: &str| CoordinateParseError::new(LAYOUT_NAME, path, reason);

        let (scope, rest) = match path.strip_prefix('@') {
            Some(scoped) => {
                let (scope, rest) = scoped.split_once('/')
                    .ok_or_else(|| err("scope without package"))?;
                (Some(scope), rest)
            }
            None => (None, path),
        };

        let segments: Vec<&str> = rest.split('/').collect();
        let [name, version, file_name] = segments[..] else {
            return Err(err("expected [@scope/]name/version/file"));
        };

        if let Some(scope) = scope {
            if !NAME_REGEX.is_match(scope) {
                return Err(err("invalid scope"));
            }
        }
        if !NAME_REGEX.is_match(name) {
            return Err(err("invalid package name"));
        }
        if version.is_empty() {
            return Err(err("empty version"));
        }

        let extension = if file_name == "package.json" {
            "json"
        }
        else if file_name == format!("{}-{}.tgz", name, version) {
            "tgz"
        }
        else {
            return Err(err("file name must be package.json or <name>-<version>.tgz"));
        };

        Ok(NpmCoordinates::new(scope, name, version, extension))
    }

    fn to_path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}/{}/{}/{}", scope, self.name, self.version, self.file_name()),
            None => format!("{}/{}/{}", self.name, self.version, self.file_name()),
        }
    }

    fn id(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}/{}@{}", scope, self.name, self.version),
            None => format!("{}@{}", self.name, self.version),
        }
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("scope", self.scope.clone()),
            ("name", Some(self.name.clone())),
            ("version", Some(self.version.clone())),
            ("extension", Some(self.extension.clone())),
        ]
    }
}
