//! In-memory object storage for development and testing.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Result, TapfolioError};

use super::{ObjectStorage, StoredObject};

#[derive(Clone)]
struct StoredRecord {
    data: Vec<u8>,
    #[allow(dead_code)]
    content_type: String,
}

#[derive(Default)]
struct Inner {
    /// Keyed by (bucket, path).
    objects: RwLock<HashMap<(String, String), StoredRecord>>,
    /// Source paths whose copy should fail (failure injection for tests).
    fail_copy_paths: RwLock<HashSet<String>>,
    /// Whether bulk removals should fail (failure injection for tests).
    fail_removals: RwLock<bool>,
}

/// In-memory [`ObjectStorage`] backend.
///
/// Wraps its data in `Arc` for cheap cloning, so tests can keep a handle
/// while the service under test owns another.
#[derive(Clone, Default)]
pub struct InMemoryObjectStorage {
    inner: Arc<Inner>,
}

impl InMemoryObjectStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object directly (for tests).
    pub fn put(&self, bucket: &str, path: &str, data: Vec<u8>) {
        self.inner.objects.write().unwrap().insert(
            (bucket.to_string(), path.to_string()),
            StoredRecord {
                data,
                content_type: "application/octet-stream".to_string(),
            },
        );
    }

    /// Whether an object exists (for tests).
    #[must_use]
    pub fn contains(&self, bucket: &str, path: &str) -> bool {
        self.inner
            .objects
            .read()
            .unwrap()
            .contains_key(&(bucket.to_string(), path.to_string()))
    }

    /// Number of objects in a bucket (for tests).
    #[must_use]
    pub fn object_count(&self, bucket: &str) -> usize {
        self.inner
            .objects
            .read()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    /// Make copies of `path` fail until cleared (for tests).
    pub fn fail_copies_of(&self, path: &str) {
        self.inner
            .fail_copy_paths
            .write()
            .unwrap()
            .insert(path.to_string());
    }

    /// Clear all injected copy failures (for tests).
    pub fn clear_copy_failures(&self) {
        self.inner.fail_copy_paths.write().unwrap().clear();
    }

    /// Make all bulk removals fail (for tests).
    pub fn fail_removals(&self, fail: bool) {
        *self.inner.fail_removals.write().unwrap() = fail;
    }
}

#[async_trait]
impl ObjectStorage for InMemoryObjectStorage {
    async fn upload(
        &self,
        data: Vec<u8>,
        content_type: &str,
        path: &str,
        bucket: &str,
        overwrite: bool,
    ) -> Result<StoredObject> {
        let key = (bucket.to_string(), path.to_string());
        let mut objects = self.inner.objects.write().unwrap();
        if !overwrite && objects.contains_key(&key) {
            return Err(TapfolioError::storage(format!(
                "object already exists: {bucket}/{path}"
            )));
        }
        objects.insert(
            key,
            StoredRecord {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredObject {
            path: path.to_string(),
            url: self.public_url(bucket, path),
        })
    }

    async fn copy_between_buckets(
        &self,
        from_bucket: &str,
        to_bucket: &str,
        from_path: &str,
        to_path: &str,
    ) -> Result<()> {
        if self
            .inner
            .fail_copy_paths
            .read()
            .unwrap()
            .contains(from_path)
        {
            return Err(TapfolioError::storage(format!(
                "copy failed: {from_bucket}/{from_path}"
            )));
        }

        let mut objects = self.inner.objects.write().unwrap();
        let record = objects
            .get(&(from_bucket.to_string(), from_path.to_string()))
            .cloned()
            .ok_or_else(|| {
                TapfolioError::storage(format!("source object missing: {from_bucket}/{from_path}"))
            })?;
        objects.insert((to_bucket.to_string(), to_path.to_string()), record);
        Ok(())
    }

    async fn remove_objects(&self, paths: &[String], buckets: &[String]) -> Result<()> {
        if *self.inner.fail_removals.read().unwrap() {
            return Err(TapfolioError::storage("bulk removal failed"));
        }

        let mut objects = self.inner.objects.write().unwrap();
        for bucket in buckets {
            for path in paths {
                // Removing an already-removed object is a no-op.
                objects.remove(&(bucket.clone(), path.clone()));
            }
        }
        Ok(())
    }

    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        self.inner
            .objects
            .read()
            .unwrap()
            .get(&(bucket.to_string(), path.to_string()))
            .map(|r| r.data.clone())
            .ok_or_else(|| TapfolioError::not_found(format!("object: {bucket}/{path}")))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("https://storage.tapfolio.test/{bucket}/{path}")
    }
}
