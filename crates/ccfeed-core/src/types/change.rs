use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hash::{hash_id, hash_object};
use crate::types::block::{Block, BlockId, Target, Timestamp};
use crate::types::diff::{BlockStakeOutputDiff, CoinOutputDiff};

hash_id!(
    /// Identifier of a changelog entry and of the consensus change computed
    /// from it
    ChangeId
);

/// One atomic mutation of the consensus set.
///
/// `reverted_blocks` is kept in the order the blocks were applied
/// (oldest first); consumers replay it newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub id: ChangeId,
    pub reverted_blocks: Vec<BlockId>,
    pub applied_blocks: Vec<BlockId>,
}

impl ChangeEntry {
    /// Create an entry that follows `prev` in the changelog.
    ///
    /// The id covers the predecessor as well as the block lists, so a
    /// mutation that repeats an earlier one (a chain flapping between two
    /// tips) still gets a fresh id.
    pub fn new(
        prev: Option<ChangeId>,
        reverted_blocks: Vec<BlockId>,
        applied_blocks: Vec<BlockId>,
    ) -> Result<Self, CoreError> {
        let id = hash_object(&(prev, &reverted_blocks, &applied_blocks))?;
        Ok(ChangeEntry {
            id: ChangeId(id),
            reverted_blocks,
            applied_blocks,
        })
    }

    /// The synthetic first entry: apply the genesis block, revert nothing
    pub fn genesis(genesis_id: BlockId) -> Result<Self, CoreError> {
        ChangeEntry::new(None, Vec::new(), vec![genesis_id])
    }

    /// The block the chain ends on once this entry is applied
    pub fn last_applied(&self) -> Option<&BlockId> {
        self.applied_blocks.last()
    }
}

/// Fully hydrated view of a [`ChangeEntry`], ready for delivery.
///
/// Diffs are ordered so that playing them front to back moves a consumer's
/// derived state from the chain before the mutation to the chain after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusChange {
    pub id: ChangeId,
    pub reverted_blocks: Vec<Block>,
    pub applied_blocks: Vec<Block>,
    pub coin_output_diffs: Vec<CoinOutputDiff>,
    pub block_stake_output_diffs: Vec<BlockStakeOutputDiff>,
    pub child_target: Target,
    pub minimum_valid_child_timestamp: Timestamp,
    pub synced: bool,
}

impl ConsensusChange {
    /// Whether this change undoes blocks before applying new ones
    pub fn is_reorg(&self) -> bool {
        !self.reverted_blocks.is_empty()
    }
}

/// Where a subscriber wants its feed to start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Checkpoint {
    /// Replay every change, starting with the genesis entry
    Beginning,
    /// Skip catch-up and only receive changes made from now on
    Recent,
    /// The last change the subscriber has already processed
    At(ChangeId),
}

impl From<ChangeId> for Checkpoint {
    fn from(id: ChangeId) -> Self {
        Checkpoint::At(id)
    }
}

impl FromStr for Checkpoint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "beginning" => Ok(Checkpoint::Beginning),
            "recent" => Ok(Checkpoint::Recent),
            other => ChangeId::from_hex(other)
                .map(Checkpoint::At)
                .map_err(|_| CoreError::InvalidCheckpoint(other.to_string())),
        }
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Checkpoint::Beginning => write!(f, "beginning"),
            Checkpoint::Recent => write!(f, "recent"),
            Checkpoint::At(id) => write!(f, "{}", id),
        }
    }
}
