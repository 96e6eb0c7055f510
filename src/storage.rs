pub mod backing_store;
pub mod fs_backing_store;
pub mod registry;
pub mod repository;
pub mod transient_backing_store;

pub use backing_store::{BackingStore, StoreEntry, StoreMetadata, StoreWriter};
pub use registry::{Storage, StorageRegistry};
pub use repository::{Repository, RepositoryPolicy, RepositoryType};
