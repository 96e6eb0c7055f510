use lazy_static::lazy_static;
use regex::Regex;

use crate::coordinates::Coordinates;
use crate::error::CoordinateParseError;

pub const LAYOUT_NAME: &str = "docker";

lazy_static! {
    static ref IMAGE_SEGMENT_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*$").unwrap();
    static ref TAG_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap();
    static ref DIGEST_REGEX: Regex = Regex::new(r"^sha256:[a-f0-9]{64}$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DockerObjectKind {
    Manifest,
    Blob,
}

impl DockerObjectKind {
    fn directory(&self) -> &'static str {
        match self {
            DockerObjectKind::Manifest => "manifests",
            DockerObjectKind::Blob => "blobs",
        }
    }
}

/// `image/name/manifests/<tag or digest>` or `image/name/blobs/<digest>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DockerCoordinates {
    pub image: String,
    pub kind: DockerObjectKind,
    pub reference: String,
}

impl DockerCoordinates {
    pub fn is_digest_reference(&self) -> bool {
        DIGEST_REGEX.is_match(&self.reference)
    }
}

impl Coordinates for DockerCoordinates {
    fn from_path(path: &str) -> Result<Self, CoordinateParseError> {
        let err = |reason: &str| CoordinateParseError::new(LAYOUT_NAME, path, reason);

        let segments: Vec<&str> = path.split('/').collect();
        if segments.len() < 3 {
            return Err(err("expected <image>/(manifests|blobs)/<reference>"));
        }
        let reference = segments[segments.len() - 1];
        let kind = match segments[segments.len() - 2] {
            "manifests" => DockerObjectKind::Manifest,
            "blobs" => DockerObjectKind::Blob,
            _ => return Err(err("expected a manifests or blobs directory")),
        };
        let image_segments = &segments[..segments.len() - 2];
        if !image_segments.iter().all(|s| IMAGE_SEGMENT_REGEX.is_match(s)) {
            return Err(err("invalid image name"));
        }

        let valid_reference = match kind {
            DockerObjectKind::Manifest => TAG_REGEX.is_match(reference) || DIGEST_REGEX.is_match(reference),
            DockerObjectKind::Blob => DIGEST_REGEX.is_match(reference),
        };
        if !valid_reference {
            return Err(err("invalid tag or digest"));
        }

        Ok(DockerCoordinates {
            image: image_segments.join("/"),
            kind,
            reference: reference.to_string(),
        })
    }

    fn to_path(&self) -> String {
        format!("{}/{}/{}", self.image, self.kind.directory(), self.reference)
    }

    fn id(&self) -> String {
        if self.is_digest_reference() {
            format!("{}@{}", self.image, self.reference)
        }
        else {
            format!("{}:{}", self.image, self.reference)
        }
    }

    fn version(&self) -> Option<&str> {
        Some(&self.reference)
    }

    fn fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("image", Some(self.image.clone())),
            ("kind", Some(self.kind.directory().to_string())),
            ("reference", Some(self.reference.clone())),
        ]
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::*;

    const DIGEST: &str = "sha256:b5d4045c3f466fa91fe2cc6abe79232a1a57cdf104f7a26e716e0a1e2789df78";

    #[rstest]
    #[case::tag("library/alpine/manifests/3.19", "library/alpine:3.19")]
    #[case::single_segment("alpine/manifests/latest", "alpine:latest")]
    #[case::manifest_by_digest(&format!("alpine/manifests/{}", DIGEST), &format!("alpine@{}", DIGEST))]
    #[case::blob(&format!("my-org/my_app/blobs/{}", DIGEST), &format!("my-org/my_app@{}", DIGEST))]
    fn test_round_trip(#[case] path: &str, #[case] id: &str) {
        let parsed = DockerCoordinates::from_path(path).unwrap();
        assert_eq!(parsed.to_path(), path);
        assert_eq!(parsed.id(), id);
    }

    #[rstest]
    #[case::blob_by_tag("alpine/blobs/latest")]
    #[case::upper_case_image("Alpine/manifests/latest")]
    #[case::unknown_kind("alpine/layers/latest")]
    #[case::no_image("manifests/latest")]
    #[case::bad_tag("alpine/manifests/-latest")]
    fn test_invalid(#[case] path: &str) {
        assert!(DockerCoordinates::from_path(path).is_err());
    }
}
