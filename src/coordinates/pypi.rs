use crate::coordinates::{split_segments, Coordinates};
use crate::error::CoordinateParseError;

pub const LAYOUT_NAME: &str = "pypi";

const SDIST_EXTENSIONS: [&str; 3] = ["tar.gz", "zip", "tar.bz2"];

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PypiPackaging {
    /// `{distribution}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
    Wheel {
        build: Option<String>,
        python: String,
        abi: String,
        platform: String,
    },
    /// `{distribution}-{version}.{extension}`
    Sdist {
        extension: String,
    },
}

/// `distribution/version/<wheel or sdist file name>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PypiCoordinates {
    pub distribution: String,
    pub version: String,
    pub packaging: PypiPackaging,
}

impl PypiCoordinates {
    /// wheel file names escape '-' in the distribution name as '_'
    fn wheel_distribution(&self) -> String {
        self.distribution.replace('-', "_")
    }

    pub fn file_name(&self) -> String {
        match &self.packaging {
            PypiPackaging::Wheel { build, python, abi, platform } => {
                let build = build.as_ref().map(|b| format!("-{}", b)).unwrap_or_default();
                format!("{}-{}{}-{}-{}-{}.whl", self.wheel_distribution(), self.version, build, python, abi, platform)
            }
            PypiPackaging::Sdist { extension } => format!("{}-{}.{}", self.distribution, self.version, extension),
        }
    }
}

impl Coordinates for PypiCoordinates {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        let segments = split_segments(LAYOUT_NAME, path, 3, "<distribution>/<version>/<file name>")?;
        let (distribution, version, file_name) = (segments[0], segments[1], segments[2]);
        let err = |reason: &str| CoordinateParseError::new(LAYOUT_NAME, path, reason);

        if version.contains('-') {
            return Err(err("version must not contain '-'"));
        }

        let packaging = if let Some(stem) = file_name.strip_suffix(".whl") {
            let parts: Vec<&str> = stem.split('-').collect();
            let (build, python, abi, platform) = match parts[..] {
                [_, _, python, abi, platform] => (None, python, abi, platform),
                [_, _, build, python, abi, platform] => (Some(build.to_string()), python, abi, platform),
                _ => return Err(err("wheel file name must have 5 or 6 '-' separated parts")),
            };
            if parts[0] != distribution.replace('-', "_") || parts[1] != version {
                return Err(err("wheel file name does not match distribution and version"));
            }
            if !build.as_deref().map(|b| b.starts_with(|c: char| c.is_ascii_digit())).unwrap_or(true) {
                return Err(err("wheel build tag must start with a digit"));
            }
            PypiPackaging::Wheel {
                build,
                python: python.to_string(),
                abi: abi.to_string(),
                platform: platform.to_string(),
            }
        }
        else {
            let rest = file_name.strip_prefix(distribution)
                .and_then(|r| r.strip_prefix('-'))
                .and_then(|r| r.strip_prefix(version))
                .and_then(|r| r.strip_prefix('.'))
                .ok_or_else(|| err("source distribution file name does not match distribution and version"))?;
            if !SDIST_EXTENSIONS.contains(&rest) {
                return Err(err("unsupported source distribution format"));
            }
            PypiPackaging::Sdist { extension: rest.to_string() }
        };

        Ok(PypiCoordinates {
            distribution: distribution.to_string(),
            version: version.to_string(),
            packaging,
        })
    }

    fn to_path(&self) -> String {
        format!("{}/{}/{}", self.distribution, self.version, self.file_name())
    }

    fn id(&self) -> String {
        format!("{}=={}", self.distribution, self.version)
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        let (packaging, build, python, abi, platform) = match &self.packaging {
            PypiPackaging::Wheel { build, python, abi, platform } =>
                ("whl".to_string(), build.clone(), Some(python.clone()), Some(abi.clone()), Some(platform.clone())),
            PypiPackaging::Sdist { extension } =>
                (extension.clone(), None, None, None, None),
        };
        vec![
            ("distribution", Some(self.distribution.clone())),
            ("version", Some(self.version.clone())),
            ("build", build),
            ("python", python),
            ("abi", abi),
            ("platform", platform),
            ("packaging", Some(packaging)),
        ]
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case::wheel("requests/2.31.0/requests-2.31.0-py3-none-any.whl")]
    #[case::wheel_build_tag("numpy/1.26.0/numpy-1.26.0-1-cp311-cp311-manylinux_2_17_x86_64.whl")]
    #[case::wheel_dashed_distribution("typing-extensions/4.8.0/typing_extensions-4.8.0-py3-none-any.whl")]
    #[case::sdist("requests/2.31.0/requests-2.31.0.tar.gz")]
    #[case::sdist_dashed("python-dateutil/2.8.2/python-dateutil-2.8.2.zip")]
    fn test_round_trip(#[case] path: &str) {
        let parsed = PypiCoordinates::from_path(path).unwrap();
        assert_eq!(parsed.to_path(), path);
    }

    #[test]
    fn test_wheel_fields() {
        let parsed = PypiCoordinates::from_path("requests/2.31.0/requests-2.31.0-py3-none-any.whl").unwrap();
        assert_eq!(
            parsed.packaging,
            PypiPackaging::Wheel { build: None, python: "py3".to_string(), abi: "none".to_string(), platform: "any".to_string() }
        );
        assert_eq!(parsed.id(), "requests==2.31.0");
    }

    #[rstest]
    #[case::wrong_version("requests/2.31.0/requests-2.30.0.tar.gz")]
    #[case::unknown_format("requests/2.31.0/requests-2.31.0.rar")]
    #[case::short_wheel("requests/2.31.0/requests-2.31.0-py3.whl")]
    #[case::bad_build_tag("requests/2.31.0/requests-2.31.0-x-py3-none-any.whl")]
    #[case::no_version_dir("requests/requests-2.31.0.tar.gz")]
    fn test_invalid(#[case] path: &str) {
        assert!(PypiCoordinates::from_path(path).is_err());
    }
}
