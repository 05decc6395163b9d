use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use ccfeed_core::serialize;
use tracing::debug;

use super::overlay::StagedMap;
use super::Storage;
use crate::error::StoreError;

/// File-backed storage using a single snapshot file.
///
/// Every commit rewrites the snapshot through a temporary file and a rename,
/// so the file on disk always holds a fully committed state.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    inner: StagedMap,
}

impl FileStorage {
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, StoreError> {
        let path = path.into();
        let data: BTreeMap<Vec<u8>, Vec<u8>> = match fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serialize::from_bytes(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(StoreError::Storage(e.to_string())),
        };

        debug!("Opened {:?} with {} keys", path, data.len());

        Ok(FileStorage {
            path,
            inner: StagedMap::with_data(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush_to_disk(&self, data: &BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Storage(e.to_string()))?;
        }

        let bytes = serialize::to_bytes(data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &bytes).map_err(|e| StoreError::Storage(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.get(key)
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.inner.stage(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.inner.stage(key, None);
    }

    /// The new state only becomes visible once it is on disk; a failed
    /// flush leaves the staged writes in place for `rollback`.
    fn commit(&mut self) -> Result<(), StoreError> {
        if !self.inner.has_pending() {
            return Ok(());
        }
        let merged = self.inner.merged();
        self.flush_to_disk(&merged)?;
        self.inner.replace_committed(merged);
        Ok(())
    }

    fn rollback(&mut self) {
        self.inner.discard_pending();
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.inner.keys_with_prefix(prefix)
    }
}
