//! Object-storage collaborator contract.
//!
//! The core never talks to a storage provider directly; it goes through the
//! [`ObjectStorage`] trait. Transport, auth and retries belong to the
//! implementation. An in-memory backend is provided for development and
//! testing, mirroring the pattern used for the persistence stores.

mod memory;
pub mod paths;

pub use memory::InMemoryObjectStorage;

use async_trait::async_trait;

use crate::error::Result;

/// Result of a successful upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub url: String,
}

/// Contract for the object-storage backend.
///
/// Bulk removal is best-effort: removing an object that is already gone is
/// not an error. Callers must restrict removal paths through
/// [`paths::normalize_paths`] first.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store an object. Fails if the object already exists, unless
    /// `overwrite` is set.
    async fn upload(
        &self,
        data: Vec<u8>,
        content_type: &str,
        path: &str,
        bucket: &str,
        overwrite: bool,
    ) -> Result<StoredObject>;

    /// Copy a single object across buckets. Fails if the source is missing.
    async fn copy_between_buckets(
        &self,
        from_bucket: &str,
        to_bucket: &str,
        from_path: &str,
        to_path: &str,
    ) -> Result<()>;

    /// Best-effort bulk delete of `paths` from each of `buckets`.
    async fn remove_objects(&self, paths: &[String], buckets: &[String]) -> Result<()>;

    /// Read an object back.
    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    /// Deterministic public URL for an object. No I/O.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
