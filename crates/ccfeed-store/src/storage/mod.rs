pub mod memory;
mod overlay;
pub mod persistent;

use crate::error::StoreError;

/// Key-value backend of the chain database.
///
/// Writes are staged until [`Storage::commit`]; reads observe staged writes.
/// A mutation of the chain database stages all of its keys and commits them
/// together, so a crash never leaves half a changelog node behind.
pub trait Storage: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Stage a key-value pair
    fn put(&mut self, key: &[u8], value: &[u8]);

    /// Stage a deletion
    fn delete(&mut self, key: &[u8]);

    /// Make staged writes durable
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Drop staged writes
    fn rollback(&mut self);

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Get all keys with a given prefix
    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>>;
}

pub use memory::MemoryStorage;
pub use persistent::FileStorage;
