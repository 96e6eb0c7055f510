use lazy_static::lazy_static;
use regex::Regex;

use crate::error::CoordinateParseError;
use crate::maven::coordinates::*;

pub const LAYOUT_NAME: &str = "maven2";

lazy_static! {
    static ref UNIQUE_SNAPSHOT_REGEX: Regex = Regex::new(r"^(\d{8}\.\d{6})-(\d+)").unwrap();
}

/// extensions that consist of more than one '.' separated part
const COMPOUND_EXTENSIONS: [&str; 3] = [".tar.gz", ".tar.bz2", ".tar.xz"];

pub fn as_maven_path(artifact_ref: &MavenArtifactRef) -> String {
    format!(
        "{}/{}/{}/{}",
        artifact_ref.coordinates.group_id.0.replace('.', "/"),
        artifact_ref.coordinates.artifact_id.0,
        artifact_ref.coordinates.version.base_version(),
        maven_file_name(artifact_ref),
    )
}

/// `group/path/artifactId` - the directory holding the artifact level `maven-metadata.xml`
pub fn artifact_directory(group_id: &MavenGroupId, artifact_id: &MavenArtifactId) -> String {
    format!("{}/{}", group_id.0.replace('.', "/"), artifact_id.0)
}

fn maven_file_name(artifact_ref: &MavenArtifactRef) -> String {
    let classifier_string = match &artifact_ref.classifier {
        MavenClassifier::Unclassified => "".to_string(),
        MavenClassifier::Classified(c) => format!("-{}", c),
    };

    format!("{}-{}{}{}",
            artifact_ref.coordinates.artifact_id.0,
            artifact_ref.coordinates.version.file_version(),
            classifier_string,
            artifact_ref.file_extension,
    )
}

/// path is the relative path inside a maven repository, i.e. it starts with something like
///  "org/..." or "com/..."
pub fn parse_maven_path(path: &str) -> Result<MavenArtifactRef, CoordinateParseError> {
    let err = |reason: &str| CoordinateParseError::new(LAYOUT_NAME, path, reason);

    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 4 {
        return Err(err("expected <group path>/<artifactId>/<version>/<file name>"));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(err("empty path segment"));
    }

    let file_name = segments[segments.len() - 1];
    let version = segments[segments.len() - 2];
    let artifact_id = segments[segments.len() - 3];
    let group_segments = &segments[..segments.len() - 3];

    // dots in a group directory would not survive the round trip through the group id
    if group_segments.iter().any(|s| s.contains('.')) {
        return Err(err("group directories must not contain '.'"));
    }

    let parsed_filename = parse_maven_filename(file_name, artifact_id, version)
        .map_err(|reason| err(&reason))?;

    Ok(MavenArtifactRef {
        coordinates: MavenCoordinates {
            group_id: MavenGroupId(group_segments.join(".")),
            artifact_id: MavenArtifactId(artifact_id.to_string()),
            version: parsed_filename.version,
        },
        classifier: match parsed_filename.classifier {
            None => MavenClassifier::Unclassified,
            Some(s) => MavenClassifier::Classified(s.to_string()),
        },
        file_extension: parsed_filename.extension.to_string(),
    })
}

fn parse_maven_filename<'a>(file_name: &'a str, artifact_id: &str, version_string: &str) -> Result<ParseFilenameResult<'a>, String> {
    let full_file_name = file_name;

    let file_name = file_name.strip_prefix(artifact_id)
        .ok_or_else(|| format!("{} is not a valid maven file name: expected to start with artifact id {}", full_file_name, artifact_id))?;
    let file_name = file_name.strip_prefix('-')
        .ok_or_else(|| format!("{} is not a valid maven file name: expected '-' after artifact id", full_file_name))?;

    match MavenVersion::parse_base_version(version_string) {
        MavenVersion::Release(version) => {
            //  <artifactId>-<version>[-<classifier>].<extension>
            let file_name = file_name.strip_prefix(version_string)
                .ok_or_else(|| format!("{} is not a valid maven file name: expected to have version string {}", full_file_name, version_string))?;
            let (classifier, extension) = split_classifier_and_extension(file_name, full_file_name)?;

            Ok(ParseFilenameResult {
                version: MavenVersion::Release(version),
                classifier,
                extension,
            })
        }
        MavenVersion::Snapshot { version, .. } => {
            if let Some(file_name) = file_name.strip_prefix(version_string) {
                // non-unique snapshot: <artifactId>-<version>-SNAPSHOT[-<classifier>].<extension>
                let (classifier, extension) = split_classifier_and_extension(file_name, full_file_name)?;
                return Ok(ParseFilenameResult {
                    version: MavenVersion::Snapshot { version, build: None },
                    classifier,
                    extension,
                });
            }

            // <artifactId>-<version>-<timestamp>-<buildNumber>[-<classifier>].<extension>
            let base = &version_string[..version_string.len() - SNAPSHOT_SUFFIX.len()];
            let file_name = file_name.strip_prefix(base)
                .and_then(|s| s.strip_prefix('-'))
                .ok_or_else(|| format!("{} is not a valid maven file name: expected to have version string {}", full_file_name, version_string))?;

            let captures = UNIQUE_SNAPSHOT_REGEX.captures(file_name)
                .ok_or_else(|| format!("snapshot file name without timestamp and build number: {}", full_file_name))?;
            let whole = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
            let timestamp = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            let build_number = captures.get(2).map(|m| m.as_str()).unwrap_or_default()
                .parse::<u32>()
                .map_err(|e| format!("invalid snapshot build number in {}: {}", full_file_name, e))?;

            let (classifier, extension) = split_classifier_and_extension(&file_name[whole.len()..], full_file_name)?;

            Ok(ParseFilenameResult {
                version: MavenVersion::Snapshot {
                    version,
                    build: Some(SnapshotBuild {
                        timestamp: timestamp.to_string(),
                        build_number,
                    }),
                },
                classifier,
                extension,
            })
        }
    }
}

/// `rest` is what follows the version in a file name, e.g. `-sources.jar`, `.tar.gz` or ``
fn split_classifier_and_extension<'a>(rest: &'a str, full_file_name: &str) -> Result<(Option<&'a str>, &'a str), String> {
    if rest.is_empty() || rest.starts_with('.') {
        return Ok((None, rest));
    }

    let Some(rest) = rest.strip_prefix('-') else {
        return Err(format!("not a valid maven file name - invalid classifier format: {}", full_file_name));
    };

    let extension_start = COMPOUND_EXTENSIONS.iter()
        .find(|ext| rest.len() > ext.len() && rest.ends_with(*ext))
        .map(|ext| rest.len() - ext.len())
        .or_else(|| rest.rfind('.'))
        .unwrap_or(rest.len());

    let (classifier, extension) = rest.split_at(extension_start);
    if classifier.is_empty() {
        return Err(format!("not a valid maven file name - empty classifier: {}", full_file_name));
    }
    Ok((Some(classifier), extension))
}

#[derive(Debug, Eq, PartialEq)]
struct ParseFilenameResult<'a> {
    version: MavenVersion,
    classifier: Option<&'a str>,
    extension: &'a str, // including leading '.', e.g. ".jar"
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    fn release(v: &str) -> MavenVersion {
        MavenVersion::Release(v.to_string())
    }

    fn unique_snapshot(v: &str, timestamp: &str, build_number: u32) -> MavenVersion {
        MavenVersion::Snapshot { version: v.to_string(), build: Some(SnapshotBuild { timestamp: timestamp.to_string(), build_number }) }
    }

    #[rstest]
    #[case::release("a-1.0.0.jar", "a", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: ".jar"} ))]
    #[case::release_with_dash("x-y-1.0.0.jar", "x-y", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: ".jar"} ))]
    #[case::release_version_with_dash_prefix("x-y-1.0.0.jar", "x", "y-1.0.0", Some(ParseFilenameResult{ version: release("y-1.0.0"), classifier: None, extension: ".jar"} ))]
    #[case::release_version_with_dash_suffix("x-1.0.0-y.jar", "x", "1.0.0-y", Some(ParseFilenameResult{ version: release("1.0.0-y"), classifier: None, extension: ".jar"} ))]
    #[case::release_extension("q-1.0.0.abc", "q", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: ".abc"} ))]
    #[case::release_compound_extension("q-1.0.0.tar.gz", "q", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: ".tar.gz"} ))]
    #[case::release_classifier_compound_extension("q-1.0.0-bin.tar.gz", "q", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: Some("bin"), extension: ".tar.gz"} ))]
    #[case::release_classifier("a-1.0.0-cla.jar", "a", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: Some("cla"), extension: ".jar"} ))]
    #[case::release_classifier_with_dash("a-1.0.0-cla-rst.jar", "a", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: Some("cla-rst"), extension: ".jar"} ))]
    #[case::release_classifier_with_dash_suffix("a-1.0.0-cla-rst.jar", "a", "1.0.0-cla", Some(ParseFilenameResult{ version: release("1.0.0-cla"), classifier: Some("rst"), extension: ".jar"} ))]
    #[case::release_no_extension("a-1.0.0", "a", "1.0.0", Some(ParseFilenameResult{ version: release("1.0.0"), classifier: None, extension: ""} ))]
    #[case::release_invalid_too_short_1("xxxxxx", "a", "1.0.0", None)]
    #[case::release_invalid_too_short_2("", "a", "1.0.0", None)]
    #[case::release_invalid_wrong_artifact("a-1.0.0.jar", "b", "1.0.0", None)]
    #[case::release_invalid_no_dash_after_artifact("a1.0.0.jar", "a", "1.0.0", None)]
    #[case::release_invalid_wrong_version("a-1.0.0.jar", "a", "1.0.1", None)]
    #[case::release_invalid_no_version("a.jar", "a", "1.0.0", None)]
    #[case::release_invalid_no_dash_before_classifier("a-1.0.0xyz.jar", "a", "1.0.0", None)]
    #[case::release_invalid_empty_classifier("a-1.0.0-.jar", "a", "1.0.0", None)]

    #[case::snapshot("a-1.0.0-20240101.123456-1.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: unique_snapshot("1.0.0-SNAPSHOT", "20240101.123456", 1), classifier: None, extension: ".jar"}))]
    #[case::snapshot_classifier("a-1.0.0-20240101.123456-5-sources.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: unique_snapshot("1.0.0-SNAPSHOT", "20240101.123456", 5), classifier: Some("sources"), extension: ".jar"}))]
    #[case::snapshot_classifier_like_timestamp("a-1.0.0-20240101.123456-5-11111111.111111.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: unique_snapshot("1.0.0-SNAPSHOT", "20240101.123456", 5), classifier: Some("11111111.111111"), extension: ".jar"}))]
    #[case::snapshot_classifier_with_dash("a-1.0.0-22222222.222222-12-a-b-c.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: unique_snapshot("1.0.0-SNAPSHOT", "22222222.222222", 12), classifier: Some("a-b-c"), extension: ".jar"}))]
    #[case::snapshot_non_unique("a-1.0.0-SNAPSHOT.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: MavenVersion::Snapshot { version: "1.0.0-SNAPSHOT".to_string(), build: None }, classifier: None, extension: ".jar"}))]
    #[case::snapshot_non_unique_classifier("a-1.0.0-SNAPSHOT-tests.jar", "a", "1.0.0-SNAPSHOT", Some(ParseFilenameResult{ version: MavenVersion::Snapshot { version: "1.0.0-SNAPSHOT".to_string(), build: None }, classifier: Some("tests"), extension: ".jar"}))]
    #[case::snapshot_without_build_number("a-1.0.0-20240101.123456.jar", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_without_timestamp_but_classifier("a-1.0.0-a-b-c.jar", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_too_short_1("xxxxxxxxxxxxxxx", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_too_short_2("", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_wrong_artifact("a-1.0.0-20240101.123456-1.jar", "b", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_no_dash_after_artifact("a1.0.0-20240101.123456-1.jar", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_wrong_version("a-1.0.0-20240101.123456-1.jar", "a", "1.0.1-SNAPSHOT", None)]
    #[case::snapshot_invalid_no_version("a.jar", "a", "1.0.0-SNAPSHOT", None)]
    #[case::snapshot_invalid_build_number("a-1.0.0-20240101.123456-a.jar", "a", "1.0.0-SNAPSHOT", None)]

    #[case::snapshot_lowercase_snapshot("a-1.0.0-snapshot-12345678.123456-a.jar", "a", "1.0.0-snapshot", Some(ParseFilenameResult{ version: release("1.0.0-snapshot"), classifier: Some("12345678.123456-a"), extension: ".jar"}))]
    fn test_parse_filename(#[case] file_name: &str, #[case] artifact_id: &str, #[case] version_string: &str, #[case] expected: Option<ParseFilenameResult>) {
        let actual = parse_maven_filename(file_name, artifact_id, version_string);

        if let Some(expected) = expected {
            let actual = actual.unwrap();
            assert_eq!(actual, expected);
        }
        else {
            assert!(actual.is_err());
        }
    }

    #[test]
    fn test_parse_path() {
        let actual = parse_maven_path("com/example/lib/1.0/lib-1.0.jar").unwrap();
        assert_eq!(actual.coordinates.group_id, MavenGroupId("com.example".to_string()));
        assert_eq!(actual.coordinates.artifact_id, MavenArtifactId("lib".to_string()));
        assert_eq!(actual.coordinates.version, release("1.0"));
        assert_eq!(actual.classifier, MavenClassifier::Unclassified);
        assert_eq!(actual.extension(), "jar");
        assert_eq!(actual.id(), "com.example:lib:jar:1.0");
    }

    #[rstest]
    #[case::release("com/example/lib/1.0/lib-1.0.jar")]
    #[case::pom("org/apache/maven/maven-core/3.9.5/maven-core-3.9.5.pom")]
    #[case::classifier("com/example/lib/1.0/lib-1.0-sources.jar")]
    #[case::single_group_segment("junit/junit/4.13.2/junit-4.13.2.jar")]
    #[case::unique_snapshot("com/example/lib/1.1-SNAPSHOT/lib-1.1-20240101.120000-3-javadoc.jar")]
    #[case::non_unique_snapshot("com/example/lib/1.1-SNAPSHOT/lib-1.1-SNAPSHOT.pom")]
    #[case::compound("com/example/dist/2.0/dist-2.0-bin.tar.gz")]
    fn test_path_round_trip(#[case] path: &str) {
        let parsed = parse_maven_path(path).unwrap();
        assert_eq!(as_maven_path(&parsed), path);
    }

    #[rstest]
    #[case::too_short("lib/1.0/lib-1.0.jar")]
    #[case::empty_segment("com//lib/1.0/lib-1.0.jar")]
    #[case::dotted_group_directory("com.example/lib/1.0/lib-1.0.jar")]
    #[case::file_does_not_match_directory("com/example/lib/1.0/other-1.0.jar")]
    #[case::metadata("com/example/lib/maven-metadata.xml")]
    fn test_parse_path_invalid(#[case] path: &str) {
        let err = parse_maven_path(path).unwrap_err();
        assert_eq!(err.layout, LAYOUT_NAME);
        assert_eq!(err.path, path);
    }
}
