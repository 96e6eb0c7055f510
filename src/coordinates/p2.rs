use lazy_static::lazy_static;
use regex::Regex;

use crate::coordinates::Coordinates;
use crate::error::CoordinateParseError;

pub const LAYOUT_NAME: &str = "p2";

lazy_static! {
    static ref P2_PATH_REGEX: Regex = Regex::new(
        r"^(?P<classifier>plugins|features)/(?P<id>[A-Za-z0-9_.-]+?)_(?P<version>\d+\.\d+\.\d+(?:\.[A-Za-z0-9_-]+)?)\.jar$"
    ).unwrap();
}

/// `plugins/<id>_<version>.jar` for bundles, `features/<id>_<version>.jar` for features
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct P2Coordinates {
    pub classifier: String, // "plugins" or "features"
    pub id: String,
    pub version: String,
}

impl P2Coordinates {
    pub fn is_feature(&self) -> bool {
        self.classifier == "features"
    }
}

impl Coordinates for P2Coordinates {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        let captures = P2_PATH_REGEX.captures(path)
            .ok_or_else(|| CoordinateParseError::new(LAYOUT_NAME, path, "expected (plugins|features)/<id>_<osgi version>.jar"))?;
        let group = |name: &str| captures.name(name).map(|m| m.as_str().to_string()).unwrap_or_default();

        Ok(P2Coordinates {
            classifier: group("classifier"),
            id: group("id"),
            version: group("version"),
        })
    }

    fn to_path(&self) -> String {
        format!("{}/{}_{}.jar", self.classifier, self.id, self.version)
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
            ("classifier", Some(self.classifier.clone())),
        ]
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::plugin("plugins/org.eclipse.core.runtime_3.26.100.v20221021-1533.jar", "org.eclipse.core.runtime", "3.26.100.v20221021-1533")]
    #[case::feature("features/org.eclipse.platform_4.27.0.jar", "org.eclipse.platform", "4.27.0")]
    #[case::underscore_in_id("plugins/com.foo_bar.core_1.0.0.qualifier.jar", "com.foo_bar.core", "1.0.0.qualifier")]
    fn test_round_trip(#[case] path: &str, #[case] id: &str, #[case] version: &str) {
        let parsed = P2Coordinates::from_path(path).unwrap();
        assert_eq!(parsed.id, id);
        assert_eq!(parsed.version, version);
        assert_eq!(parsed.to_path(), path);
    }

    #[rstest]
    #[case::no_version("plugins/org.eclipse.core.runtime.jar")]
    #[case::wrong_directory("binary/org.eclipse.core_1.0.0.jar")]
    #[case::short_version("plugins/org.eclipse.core_1.0.jar")]
    fn test_invalid(#[case] path: &str) {
        assert!(P2Coordinates::from_path(path).is_err());
    }
}
