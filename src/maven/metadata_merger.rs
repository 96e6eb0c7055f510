use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::checksum::algorithm::DigestAlgorithm;
use crate::error::ArtifactResult;
use crate::maven::coordinates::{MavenArtifactRef, MavenVersion, SnapshotBuild, SNAPSHOT_SUFFIX};
use crate::maven::metadata_xml::{Metadata, Snapshot, SnapshotVersion, SnapshotVersions, Versioning, Versions, METADATA_FILE_NAME};
use crate::maven::paths::{artifact_directory, parse_maven_path};
use crate::maven::version::compare_versions;
use crate::path::RepositoryPath;

const DESCRIPTOR_EXTENSION: &str = ".pom";

/// One version directory below an artifact, as it takes part in the artifact level metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataVersion {
    pub version: String,
    /// newest modification time of the version's descriptor files
    pub created: SystemTime,
    pub snapshots: Vec<SnapshotFile>,
}

/// one timestamped file of a snapshot version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotFile {
    pub build: SnapshotBuild,
    pub classifier: Option<String>,
    pub extension: String,
}

impl MetadataVersion {
    /// Version-aware comparison with a creation time tie-break: when `self` does not compare
    ///  greater by version but was created strictly later, it counts as greater.
    ///
    /// This is not a total order (two entries can both compare greater than each other), so it
    ///  must not be handed to `slice::sort_by`; use [`sort_metadata_versions`].
    pub fn compare(&self, other: &MetadataVersion) -> Ordering {
        let diff = compare_versions(&self.version, &other.version);
        if diff != Ordering::Greater && self.created > other.created {
            return Ordering::Greater;
        }
        diff
    }
}

/// Stable insertion sort by [`MetadataVersion::compare`]. The result depends on the input
///  order when the tie-break kicks in, so callers feed entries in a deterministic order.
pub fn sort_metadata_versions(versions: &mut [MetadataVersion]) {
    for i in 1..versions.len() {
        let mut j = i;
        while j > 0 && versions[j - 1].compare(&versions[j]) == Ordering::Greater {
            versions.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// metadata timestamps: `yyyyMMddHHmmss` in UTC
pub fn format_last_updated(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format("%Y%m%d%H%M%S").to_string()
}

/// A metadata file the merger (re)wrote, with the digests of its new content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenMetadata {
    pub path: RepositoryPath,
    pub checksums: BTreeMap<DigestAlgorithm, String>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// versions in metadata order
    pub versions: Vec<String>,
    pub written: Vec<WrittenMetadata>,
    pub deleted: Vec<RepositoryPath>,
}

/// Rebuilds `maven-metadata.xml` for the artifact `artifact` belongs to, plus the snapshot level
///  metadata of its version if that is a snapshot. Files are only rewritten if their content
///  changes, so running this repeatedly on an unchanged tree is a no-op.
pub async fn merge_metadata(path: &RepositoryPath, artifact: &MavenArtifactRef) -> ArtifactResult<MergeOutcome> {
    let coordinates = &artifact.coordinates;
    let artifact_dir = RepositoryPath::new(
        path.storage().clone(),
        path.repository().clone(),
        &artifact_directory(&coordinates.group_id, &coordinates.artifact_id),
    )?;

    let mut outcome = MergeOutcome::default();

    let mut versions = scan_versions(&artifact_dir, artifact).await?;
    sort_metadata_versions(&mut versions);
    outcome.versions = versions.iter().map(|v| v.version.clone()).collect();

    if coordinates.version.is_snapshot() {
        let version_dir = artifact_dir.resolve(coordinates.version.base_version())?;
        let snapshot_metadata = versions.iter()
            .find(|v| v.version == coordinates.version.base_version())
            .and_then(|v| snapshot_level_metadata(artifact, v));
        update_metadata_file(&version_dir, snapshot_metadata, &mut outcome, |_| true).await?;
    }

    let artifact_metadata = artifact_level_metadata(artifact, &versions);
    let new_versions: BTreeSet<String> = outcome.versions.iter().cloned().collect();
    update_metadata_file(&artifact_dir, artifact_metadata, &mut outcome, |existing| {
        // the artifact level file only changes when a version appears or disappears
        existing.versions().into_iter().collect::<BTreeSet<_>>() != new_versions
    }).await?;

    Ok(outcome)
}

/// Version directories below `artifact_dir` that contain at least one descriptor; everything
///  else is silently skipped
async fn scan_versions(artifact_dir: &RepositoryPath, artifact: &MavenArtifactRef) -> ArtifactResult<Vec<MetadataVersion>> {
    let store = artifact_dir.store();
    let mut result = Vec::new();

    for entry in store.list_children(&artifact_dir.store_key()).await? {
        // dot names are store internals, e.g. directories in the middle of being deleted
        if !entry.is_directory || entry.name.starts_with('.') {
            continue;
        }
        let version_dir = artifact_dir.resolve(&entry.name)?;

        let mut created = None;
        let mut snapshots = Vec::new();
        for file in store.list_children(&version_dir.store_key()).await? {
            if file.is_directory {
                continue;
            }
            if file.name.ends_with(DESCRIPTOR_EXTENSION) {
                let descriptor = version_dir.resolve(&file.name)?;
                if let Some(metadata) = store.metadata(&descriptor.store_key()).await? {
                    created = created.max(Some(metadata.last_modified));
                }
            }
            if entry.name.ends_with(SNAPSHOT_SUFFIX) && DigestAlgorithm::split_sidecar_path(&file.name).is_none() {
                let relative = format!("{}/{}", version_dir.relative_path(), file.name);
                if let Ok(parsed) = parse_maven_path(&relative) {
                    if parsed.coordinates.artifact_id != artifact.coordinates.artifact_id {
                        continue;
                    }
                    if let MavenVersion::Snapshot { build: Some(build), .. } = &parsed.coordinates.version {
                        snapshots.push(SnapshotFile {
                            build: build.clone(),
                            classifier: parsed.classifier.as_option().map(|c| c.to_string()),
                            extension: parsed.extension().to_string(),
                        });
                    }
                }
            }
        }

        match created {
            Some(created) => {
                snapshots.sort();
                result.push(MetadataVersion {
                    version: entry.name,
                    created,
                    snapshots,
                });
            }
            None => trace!("skipping {} - no {} file", version_dir, DESCRIPTOR_EXTENSION),
        }
    }
    Ok(result)
}

fn artifact_level_metadata(artifact: &MavenArtifactRef, versions: &[MetadataVersion]) -> Option<Metadata> {
    let newest = versions.iter().map(|v| v.created).max()?;

    Some(Metadata {
        group_id: Some(artifact.coordinates.group_id.0.clone()),
        artifact_id: Some(artifact.coordinates.artifact_id.0.clone()),
        version: None,
        versioning: Some(Versioning {
            latest: versions.last().map(|v| v.version.clone()),
            release: versions.iter().rev()
                .find(|v| !v.version.ends_with(SNAPSHOT_SUFFIX))
                .map(|v| v.version.clone()),
            versions: Some(Versions {
                version: versions.iter().map(|v| v.version.clone()).collect(),
            }),
            last_updated: Some(format_last_updated(newest)),
            snapshot: None,
            snapshot_versions: None,
        }),
    })
}

/// `None` if the directory holds no timestamped builds (e.g. only `-SNAPSHOT` named files)
fn snapshot_level_metadata(artifact: &MavenArtifactRef, version: &MetadataVersion) -> Option<Metadata> {
    let latest = version.snapshots.iter().map(|f| &f.build).max()?;

    // newest build per (extension, classifier); BTreeMap keeps the output order fixed
    let mut newest_files: BTreeMap<(String, Option<String>), &SnapshotBuild> = BTreeMap::new();
    for file in &version.snapshots {
        let key = (file.extension.clone(), file.classifier.clone());
        let replace = newest_files.get(&key).map(|b| *b < &file.build).unwrap_or(true);
        if replace {
            newest_files.insert(key, &file.build);
        }
    }

    let snapshot_versions = newest_files.into_iter()
        .map(|((extension, classifier), build)| SnapshotVersion {
            classifier,
            extension,
            value: MavenVersion::Snapshot { version: version.version.clone(), build: Some(build.clone()) }.file_version(),
            updated: build.timestamp.replace('.', ""),
        })
        .collect();

    Some(Metadata {
        group_id: Some(artifact.coordinates.group_id.0.clone()),
        artifact_id: Some(artifact.coordinates.artifact_id.0.clone()),
        version: Some(version.version.clone()),
        versioning: Some(Versioning {
            latest: None,
            release: None,
            versions: None,
            last_updated: Some(latest.timestamp.replace('.', "")),
            snapshot: Some(Snapshot {
                timestamp: Some(latest.timestamp.clone()),
                build_number: Some(latest.build_number),
                local_copy: None,
            }),
            snapshot_versions: Some(SnapshotVersions { snapshot_version: snapshot_versions }),
        }),
    })
}

/// Writes `metadata` as the `maven-metadata.xml` in `dir` when `needs_update` says the existing
///  file is outdated (or there is none / it is unreadable), and deletes the file when there is
///  nothing left to describe
async fn update_metadata_file(
    dir: &RepositoryPath,
    metadata: Option<Metadata>,
    outcome: &mut MergeOutcome,
    needs_update: impl Fn(&Metadata) -> bool,
) -> ArtifactResult<()> {
    let file = dir.resolve(METADATA_FILE_NAME)?;
    let store = file.store();
    let existing = store.read_all(&file.store_key()).await?;

    let Some(metadata) = metadata else {
        if existing.is_some() {
            debug!("no versions left, removing {}", file);
            store.delete(&file.store_key()).await?;
            for algorithm in file.digest_algorithms() {
                store.delete(&file.sidecar(*algorithm).store_key()).await?;
            }
            outcome.deleted.push(file);
        }
        return Ok(());
    };

    let rendered = metadata.render();
    if let Some(existing) = &existing {
        if existing == rendered.as_bytes() {
            trace!("{} is up to date", file);
            return Ok(());
        }
        match std::str::from_utf8(existing).ok().and_then(|s| Metadata::parse(s).ok()) {
            Some(parsed) if !needs_update(&parsed) => {
                trace!("{} lists the same versions, leaving it alone", file);
                return Ok(());
            }
            Some(_) => {}
            None => warn!("replacing unreadable metadata file {}", file),
        }
    }

    debug!("writing {}", file);
    let data = Bytes::from(rendered);
    let storage = file.storage();
    storage.write_atomic(&file.store_key(), data.clone()).await?;

    let mut checksums = BTreeMap::new();
    for algorithm in file.digest_algorithms() {
        let digest = algorithm.digest_hex(&data);
        storage.write_atomic(&file.sidecar(*algorithm).store_key(), Bytes::from(digest.clone())).await?;
        checksums.insert(*algorithm, digest);
    }
    outcome.written.push(WrittenMetadata { path: file, checksums });
    Ok(())
}
