//! Append-only changelog.
//!
//! Every entry is stored under its id together with the id of the entry that
//! was appended after it. Traversal follows those persisted links, so it can
//! resume after a restart and is unaffected by later appends: a new tail only
//! fills in the `next` link of the previous tail.

use ccfeed_core::{BlockId, ChangeEntry, ChangeId};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::db::{keys, ChainDb};
use crate::error::StoreError;
use crate::storage::Storage;

/// Persisted form of a changelog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNode {
    pub entry: ChangeEntry,
    pub next: Option<ChangeId>,
}

impl<S: Storage> ChainDb<S> {
    /// Append an entry for the given mutation as the new tail and commit it
    pub fn append_change(
        &mut self,
        reverted: Vec<BlockId>,
        applied: Vec<BlockId>,
    ) -> Result<ChangeEntry, StoreError> {
        let staged = self.stage_change(reverted, applied);
        self.commit_staged(staged)
    }

    /// Look up an entry by id; `None` if it was never appended
    pub fn resolve_change(&self, id: &ChangeId) -> Result<Option<ChangeEntry>, StoreError> {
        Ok(self.get_node(id)?.map(|node| node.entry))
    }

    /// The entry appended right after `entry`, or `None` if `entry` is the tail
    pub fn next_change(&self, entry: &ChangeEntry) -> Result<Option<ChangeEntry>, StoreError> {
        let node = self.require_node(&entry.id)?;
        match node.next {
            Some(next_id) => Ok(Some(self.require_node(&next_id)?.entry)),
            None => Ok(None),
        }
    }

    /// The entry that applies the genesis block
    pub fn genesis_change(&self) -> Result<ChangeEntry, StoreError> {
        let id: ChangeId = self
            .get_value(keys::GENESIS_CHANGE)?
            .ok_or(StoreError::Uninitialized)?;
        Ok(self.require_node(&id)?.entry)
    }

    /// Id of the most recently appended entry
    pub fn change_log_tail(&self) -> Result<ChangeId, StoreError> {
        self.get_value(keys::CHANGE_TAIL)?
            .ok_or(StoreError::Uninitialized)
    }

    /// Number of entries in the changelog, genesis included
    pub fn change_count(&self) -> usize {
        self.count_keys(keys::CHANGE)
    }

    /// Stage a new tail entry built from the current tail
    pub(crate) fn stage_change(
        &mut self,
        reverted: Vec<BlockId>,
        applied: Vec<BlockId>,
    ) -> Result<ChangeEntry, StoreError> {
        if applied.is_empty() {
            return Err(StoreError::EmptyMutation);
        }

        let tail_id = self.change_log_tail()?;
        let entry = ChangeEntry::new(Some(tail_id), reverted, applied)?;
        if self.get_node(&entry.id)?.is_some() {
            return Err(StoreError::ChangeExists(entry.id));
        }

        let mut tail = self.require_node(&tail_id)?;
        tail.next = Some(entry.id);
        self.put_value(&change_key(&tail_id), &tail)?;
        self.stage_change_node(&entry, None)?;

        debug!("Staged change {} after {}", entry.id, tail_id);
        Ok(entry)
    }

    /// Stage `entry` as a node and point the tail at it
    pub(crate) fn stage_change_node(
        &mut self,
        entry: &ChangeEntry,
        next: Option<ChangeId>,
    ) -> Result<(), StoreError> {
        let node = ChangeNode {
            entry: entry.clone(),
            next,
        };
        self.put_value(&change_key(&entry.id), &node)?;
        self.put_value(keys::CHANGE_TAIL, &entry.id)
    }

    fn get_node(&self, id: &ChangeId) -> Result<Option<ChangeNode>, StoreError> {
        self.get_value(&change_key(id))
    }

    /// A node that the changelog links to must exist
    fn require_node(&self, id: &ChangeId) -> Result<ChangeNode, StoreError> {
        self.get_node(id)?.ok_or_else(|| {
            error!("Changelog links to missing entry {}", id);
            StoreError::ChangeNotFound(*id)
        })
    }
}

/// Format changelog storage key
fn change_key(id: &ChangeId) -> Vec<u8> {
    let mut key = keys::CHANGE.to_vec();
    key.extend_from_slice(id.as_bytes());
    key
}
