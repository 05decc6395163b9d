use ccfeed_core::{serialize, BlockId, ChangeEntry, ProcessedBlock};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::storage::Storage;

/// Key prefixes for storage
pub(crate) mod keys {
    pub const BLOCK: &[u8] = b"blk:";
    pub const CHANGE: &[u8] = b"chg:";
    pub const PATH: &[u8] = b"path:";
    pub const HEAD: &[u8] = b"meta:head";
    pub const GENESIS_BLOCK: &[u8] = b"meta:genesis_block";
    pub const CHANGE_TAIL: &[u8] = b"meta:change_tail";
    pub const GENESIS_CHANGE: &[u8] = b"meta:genesis_change";
}

/// The chain database: processed blocks, the current path, and the changelog.
///
/// All reads go through `&self` and all writes through `&mut self`, so a
/// shared borrow (or a read guard around the database) is a consistent view
/// for as long as it is held.
pub struct ChainDb<S: Storage> {
    storage: S,
}

impl<S: Storage> ChainDb<S> {
    pub fn new(storage: S) -> Self {
        ChainDb { storage }
    }

    pub fn is_initialized(&self) -> bool {
        self.storage.exists(keys::GENESIS_BLOCK)
    }

    /// Store the genesis block, make it the head and write the genesis entry
    /// as the first node of the changelog.
    pub fn init_genesis(&mut self, genesis: &ProcessedBlock) -> Result<ChangeEntry, StoreError> {
        if self.is_initialized() {
            return Err(StoreError::AlreadyInitialized);
        }
        info!("Initializing chain database with genesis block {}", genesis.id);

        let staged = self.stage_genesis(genesis);
        self.commit_staged(staged)
    }

    fn stage_genesis(&mut self, genesis: &ProcessedBlock) -> Result<ChangeEntry, StoreError> {
        let entry = ChangeEntry::genesis(genesis.id)?;
        self.stage_block(genesis)?;
        self.put_value(keys::GENESIS_BLOCK, &genesis.id)?;
        self.put_value(keys::HEAD, &genesis.id)?;
        self.put_value(&path_key(0), &genesis.id)?;
        self.put_value(keys::GENESIS_CHANGE, &entry.id)?;
        self.stage_change_node(&entry, None)?;
        Ok(entry)
    }

    /// Store a processed block so later mutations can reference it
    pub fn put_block(&mut self, block: &ProcessedBlock) -> Result<(), StoreError> {
        let staged = self.stage_block(block);
        self.commit_staged(staged)
    }

    pub fn get_block(&self, id: &BlockId) -> Result<Option<ProcessedBlock>, StoreError> {
        self.get_value(&block_key(id))
    }

    pub fn has_block(&self, id: &BlockId) -> bool {
        self.storage.exists(&block_key(id))
    }

    /// Like [`ChainDb::get_block`], but a missing block is an error
    pub fn require_block(&self, id: &BlockId) -> Result<ProcessedBlock, StoreError> {
        self.get_block(id)?.ok_or(StoreError::BlockNotFound(*id))
    }

    pub fn genesis_block_id(&self) -> Result<BlockId, StoreError> {
        self.get_value(keys::GENESIS_BLOCK)?
            .ok_or(StoreError::Uninitialized)
    }

    /// Id of the block at the tip of the current path
    pub fn current_block_id(&self) -> Result<BlockId, StoreError> {
        self.get_value(keys::HEAD)?.ok_or(StoreError::Uninitialized)
    }

    pub fn current_block(&self) -> Result<ProcessedBlock, StoreError> {
        let id = self.current_block_id()?;
        self.require_block(&id)
    }

    /// Height of the current head
    pub fn height(&self) -> Result<u64, StoreError> {
        Ok(self.current_block()?.height)
    }

    /// Id of the block at `height` on the current path
    pub fn block_id_at_height(&self, height: u64) -> Result<Option<BlockId>, StoreError> {
        self.get_value(&path_key(height))
    }

    /// Record one committed mutation of the consensus set.
    ///
    /// Moves the current path off `reverted` (oldest first) and onto
    /// `applied`, points the head at the last applied block and appends the
    /// matching changelog entry. Either everything is written or nothing is.
    pub fn commit_mutation(
        &mut self,
        reverted: Vec<BlockId>,
        applied: Vec<BlockId>,
    ) -> Result<ChangeEntry, StoreError> {
        let staged = self.stage_mutation(reverted, applied);
        let entry = self.commit_staged(staged)?;

        debug!(
            "Committed change {} (reverted {}, applied {})",
            entry.id,
            entry.reverted_blocks.len(),
            entry.applied_blocks.len()
        );
        Ok(entry)
    }

    fn stage_mutation(
        &mut self,
        reverted: Vec<BlockId>,
        applied: Vec<BlockId>,
    ) -> Result<ChangeEntry, StoreError> {
        let head = applied.last().copied().ok_or(StoreError::EmptyMutation)?;

        for id in reverted.iter().rev() {
            let block = self.require_block(id)?;
            self.storage.delete(&path_key(block.height));
        }
        for id in &applied {
            let block = self.require_block(id)?;
            self.put_value(&path_key(block.height), id)?;
        }
        self.put_value(keys::HEAD, &head)?;

        self.stage_change(reverted, applied)
    }

    fn stage_block(&mut self, block: &ProcessedBlock) -> Result<(), StoreError> {
        self.put_value(&block_key(&block.id), block)
    }

    /// Commit staged writes if staging succeeded, drop them otherwise
    pub(crate) fn commit_staged<T>(&mut self, staged: Result<T, StoreError>) -> Result<T, StoreError> {
        let result = staged.and_then(|value| self.storage.commit().map(|_| value));
        if result.is_err() {
            self.storage.rollback();
        }
        result
    }

    pub(crate) fn get_value<T: DeserializeOwned>(
        &self,
        key: &[u8],
    ) -> Result<Option<T>, StoreError> {
        match self.storage.get(key) {
            Some(bytes) => serialize::from_bytes(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    pub(crate) fn put_value<T: Serialize>(&mut self, key: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes =
            serialize::to_bytes(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.storage.put(key, &bytes);
        Ok(())
    }

    pub(crate) fn count_keys(&self, prefix: &[u8]) -> usize {
        self.storage.keys_with_prefix(prefix).len()
    }
}

/// Format block storage key
fn block_key(id: &BlockId) -> Vec<u8> {
    let mut key = keys::BLOCK.to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}

/// Format current-path storage key; big-endian so keys sort by height
fn path_key(height: u64) -> Vec<u8> {
    let mut key = keys::PATH.to_vec();
    key.extend_from_slice(&height.to_be_bytes());
    key
}
