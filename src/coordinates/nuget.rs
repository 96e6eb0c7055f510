use lazy_static::lazy_static;
use regex::Regex;

use crate::coordinates::{split_segments, Coordinates};
use crate::error::CoordinateParseError;

pub const LAYOUT_NAME: &str = "nuget";

lazy_static! {
    static ref ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]*$").unwrap();
}

/// `id/version/id.version.nupkg` for the package, `id/version/id.nuspec` for its manifest
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NugetCoordinates {
    pub id: String,
    pub version: String,
    pub extension: String, // "nupkg" or "nuspec"
}

impl NugetCoordinates {
    pub fn new(id: &str, version: &str, extension: &str) -> NugetCoordinates {
        NugetCoordinates {
            id: id.to_string(),
            version: version.to_string(),
            extension: extension.to_string(),
        }
    }

    fn file_name(&self) -> String {
        match self.extension.as_str() {
            "nuspec" => format!("{}.nuspec", self.id),
            ext => format!("{}.{}.{}", self.id, self.version, ext),
        }
    }
}

impl Coordinates for NugetCoordinates {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        let segments = split_segments(LAYOUT_NAME, path, 3, "<id>/<version>/<file name>")?;
        let (id, version, file_name) = (segments[0], segments[1], segments[2]);

        if !ID_REGEX.is_match(id) {
            return Err(CoordinateParseError::new(LAYOUT_NAME, path, "invalid package id"));
        }

        let extension = if file_name == format!("{}.{}.nupkg", id, version) {
            "nupkg"
        }
        else if file_name == format!("{}.nuspec", id) {
            "nuspec"
        }
        else {
            return Err(CoordinateParseError::new(LAYOUT_NAME, path, "file name must be <id>.<version>.nupkg or <id>.nuspec"));
        };

        Ok(NugetCoordinates::new(id, version, extension))
    }

    fn to_path(&self) -> String {
        format!("{}/{}/{}", self.id, self.version, self.file_name())
    }

    fn id(&self) -> String {
        format!("{}:{}", self.id, self.version)
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("id", Some(self.id.clone())),
            ("version", Some(self.version.clone())),
            ("extension", Some(self.extension.clone())),
        ]
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::package("Newtonsoft.Json/13.0.3/Newtonsoft.Json.13.0.3.nupkg", NugetCoordinates::new("Newtonsoft.Json", "13.0.3", "nupkg"))]
    #[case::nuspec("Serilog/3.1.1/Serilog.nuspec", NugetCoordinates::new("Serilog", "3.1.1", "nuspec"))]
    #[case::prerelease("Foo/1.0.0-beta.2/Foo.1.0.0-beta.2.nupkg", NugetCoordinates::new("Foo", "1.0.0-beta.2", "nupkg"))]
    fn test_round_trip(#[case] path: &str, #[case] expected: NugetCoordinates) {
        let parsed = NugetCoordinates::from_path(path).unwrap();
        assert_eq!(parsed, expected);
        assert_eq!(parsed.to_path(), path);
    }

    #[rstest]
    #[case::wrong_version_in_file("Serilog/3.1.1/Serilog.3.1.0.nupkg")]
    #[case::wrong_extension("Serilog/3.1.1/Serilog.3.1.1.zip")]
    #[case::too_short("Serilog/Serilog.3.1.1.nupkg")]
    #[case::invalid_id("-bad/1.0/-bad.1.0.nupkg")]
    fn test_invalid(#[case] path: &str) {
        assert!(NugetCoordinates::from_path(path).is_err());
    }
}
