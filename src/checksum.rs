pub mod algorithm;
pub mod artifact_checksum;
pub mod cache;
pub mod digesting_stream;

pub use algorithm::DigestAlgorithm;
pub use artifact_checksum::ArtifactChecksum;
pub use cache::ChecksumCache;
pub use digesting_stream::{ByteStream, DigestingStream};
