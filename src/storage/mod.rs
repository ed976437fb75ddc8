pub mod blob;
pub(crate) mod filename;
pub mod size;
pub mod store;

pub use blob::FileBlob;
pub use size::DirectorySizeTracker;
pub use store::{FileBlobStore, StorageConfig, StorageError};
