use crate::coordinates::Coordinates;
use crate::error::CoordinateParseError;

pub const LAYOUT_NAME: &str = "raw";

/// Generic files: the path is the identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawCoordinates {
    pub path: String,
}

impl Coordinates for RawCoordinates {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        if path.is_empty() || path.ends_with('/') || path.split('/').any(|s| s.is_empty()) {
            return Err(CoordinateParseError::new(LAYOUT_NAME, path, "expected a non-empty file path"));
        }
        Ok(RawCoordinates { path: path.to_string() })
    }

    fn to_path(&self) -> String {
        self.path.clone()
    }

    fn id(&self) -> String {
        self.path.clone()
    }

    fn version(&self) -> Option<&str> {
        None
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![("path", Some(self.path.clone()))]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_round_trip() {
        let parsed = RawCoordinates::from_path("tools/linux/installer.sh").unwrap();
        assert_eq!(parsed.to_path(), "tools/linux/installer.sh");
        assert_eq!(parsed.version(), None);
    }

    #[test]
    fn test_invalid() {
        assert!(RawCoordinates::from_path("").is_err());
        assert!(RawCoordinates::from_path("tools/").is_err());
    }
}
