use std::fmt::Write;

use serde::Deserialize;

pub const METADATA_FILE_NAME: &str = "maven-metadata.xml";

/// The subset of https://maven.apache.org/ref/3.9.5/maven-repository-metadata/repository-metadata.html
///  that artifact and snapshot level metadata files use
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "metadata", rename_all = "camelCase")]
pub struct Metadata {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub versioning: Option<Versioning>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versioning {
    #[serde(default)]
    pub latest: Option<String>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub versions: Option<Versions>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub snapshot: Option<Snapshot>,
    #[serde(default)]
    pub snapshot_versions: Option<SnapshotVersions>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub version: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub build_number: Option<u32>,
    #[serde(default)]
    pub local_copy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotVersions {
    #[serde(default)]
    pub snapshot_version: Vec<SnapshotVersion>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SnapshotVersion {
    #[serde(default)]
    pub classifier: Option<String>,
    pub extension: String,
    pub value: String,
    pub updated: String,
}

impl Metadata {
    pub fn parse(xml: &str) -> anyhow::Result<Metadata> {
        Ok(serde_xml_rs::from_str(xml)?)
    }

    /// the listed versions, empty if there is no versioning section
    pub fn versions(&self) -> Vec<String> {
        self.versioning.as_ref()
            .and_then(|v| v.versions.as_ref())
            .map(|v| v.version.clone())
            .unwrap_or_default()
    }

    /// Renders the metadata with a fixed element order and indentation, so that equal metadata
    ///  always renders to identical bytes
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str("<metadata modelVersion=\"1.1.0\">\n");
        element(&mut out, 1, "groupId", self.group_id.as_deref());
        element(&mut out, 1, "artifactId", self.artifact_id.as_deref());
        element(&mut out, 1, "version", self.version.as_deref());

        if let Some(versioning) = &self.versioning {
            open(&mut out, 1, "versioning");
            element(&mut out, 2, "latest", versioning.latest.as_deref());
            element(&mut out, 2, "release", versioning.release.as_deref());

            if let Some(snapshot) = &versioning.snapshot {
                open(&mut out, 2, "snapshot");
                element(&mut out, 3, "timestamp", snapshot.timestamp.as_deref());
                element(&mut out, 3, "buildNumber", snapshot.build_number.map(|n| n.to_string()).as_deref());
                element(&mut out, 3, "localCopy", snapshot.local_copy.map(|b| b.to_string()).as_deref());
                close(&mut out, 2, "snapshot");
            }

            if let Some(versions) = &versioning.versions {
                open(&mut out, 2, "versions");
                for v in &versions.version {
                    element(&mut out, 3, "version", Some(v));
                }
                close(&mut out, 2, "versions");
            }

            element(&mut out, 2, "lastUpdated", versioning.last_updated.as_deref());

            if let Some(snapshot_versions) = &versioning.snapshot_versions {
                open(&mut out, 2, "snapshotVersions");
                for sv in &snapshot_versions.snapshot_version {
                    open(&mut out, 3, "snapshotVersion");
                    element(&mut out, 4, "classifier", sv.classifier.as_deref());
                    element(&mut out, 4, "extension", Some(&sv.extension));
                    element(&mut out, 4, "value", Some(&sv.value));
                    element(&mut out, 4, "updated", Some(&sv.updated));
                    close(&mut out, 3, "snapshotVersion");
                }
                close(&mut out, 2, "snapshotVersions");
            }
            close(&mut out, 1, "versioning");
        }

        out.push_str("</metadata>\n");
        out
    }
}

fn indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str("  ");
    }
}

fn open(out: &mut String, level: usize, name: &str) {
    indent(out, level);
    let _ = writeln!(out, "<{}>", name);
}

fn close(out: &mut String, level: usize, name: &str) {
    indent(out, level);
    let _ = writeln!(out, "</{}>", name);
}

fn element(out: &mut String, level: usize, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        indent(out, level);
        let _ = writeln!(out, "<{}>{}</{}>", name, escape(value), name);
    }
}

fn escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            c => result.push(c),
        }
    }
    result
}
