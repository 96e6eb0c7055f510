//! Maven 2 repository layout: coordinates, paths, version ordering and `maven-metadata.xml`

pub mod coordinates;
pub mod metadata_merger;
pub mod metadata_xml;
pub mod paths;
pub mod version;
