//! Storage and layout engine for artifact repositories: typed coordinates for several package
//!  formats, repository paths that cannot escape their repository, checksum sidecars with an
//!  in-memory digest cache, proxy and group resolution, and Maven metadata maintenance.

pub mod checksum;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod layout;
pub mod maven;
pub mod path;
pub mod remote;
pub mod resolution;
pub mod storage;

#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
