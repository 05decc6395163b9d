use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::hash::{hash_id, hash_object};
use crate::types::diff::{
    BlockStakeOutput, BlockStakeOutputDiff, CoinOutput, CoinOutputDiff, OutputDiff, OutputId,
};

/// Unix timestamp in seconds
pub type Timestamp = u64;

hash_id!(
    /// Identifier of a block: the Blake3 hash of its bincode encoding
    BlockId
);

hash_id!(
    /// Difficulty target a child block has to meet
    Target
);

/// A block as produced by the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Id of the parent block (zero for genesis)
    pub parent_id: BlockId,
    /// Unix timestamp
    pub timestamp: Timestamp,
    /// Outputs paid to the block creator
    pub miner_payouts: Vec<CoinOutput>,
    /// Free-form payload
    pub arbitrary_data: Vec<u8>,
}

impl Block {
    pub fn new(parent_id: BlockId, timestamp: Timestamp) -> Self {
        Block {
            parent_id,
            timestamp,
            miner_payouts: Vec::new(),
            arbitrary_data: Vec::new(),
        }
    }

    /// Compute the block id
    pub fn id(&self) -> Result<BlockId, CoreError> {
        hash_object(self).map(BlockId)
    }

    /// Id of the miner payout at `index`
    pub fn miner_payout_id(&self, index: u64) -> Result<OutputId, CoreError> {
        let id = self.id()?;
        hash_object(&(id, "miner_payout", index)).map(OutputId)
    }
}

/// A block together with everything the consensus set derived when it was
/// accepted: its height, the target for its children and the output diffs
/// that applying it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedBlock {
    pub id: BlockId,
    pub block: Block,
    pub height: u64,
    pub child_target: Target,
    pub coin_output_diffs: Vec<CoinOutputDiff>,
    pub block_stake_output_diffs: Vec<BlockStakeOutputDiff>,
}

impl ProcessedBlock {
    pub fn new(
        block: Block,
        height: u64,
        child_target: Target,
        coin_output_diffs: Vec<CoinOutputDiff>,
        block_stake_output_diffs: Vec<BlockStakeOutputDiff>,
    ) -> Result<Self, CoreError> {
        Ok(ProcessedBlock {
            id: block.id()?,
            block,
            height,
            child_target,
            coin_output_diffs,
            block_stake_output_diffs,
        })
    }

    pub fn parent_id(&self) -> BlockId {
        self.block.parent_id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.block.timestamp
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0
    }
}

/// Genesis block configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub timestamp: Timestamp,
    pub root_target: Target,
    pub coin_outputs: Vec<CoinOutput>,
    pub block_stake_outputs: Vec<BlockStakeOutput>,
}

impl GenesisConfig {
    /// Build the processed genesis block: every configured output becomes an
    /// apply diff of the genesis block.
    pub fn create_genesis_block(&self) -> Result<ProcessedBlock, CoreError> {
        let block = Block::new(BlockId::default(), self.timestamp);
        let block_id = block.id()?;

        let coin_output_diffs = self
            .coin_outputs
            .iter()
            .enumerate()
            .map(|(i, output)| {
                let id = hash_object(&(block_id, "genesis_coin", i as u64))?;
                Ok(OutputDiff::apply(OutputId(id), output.clone()))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let block_stake_output_diffs = self
            .block_stake_outputs
            .iter()
            .enumerate()
            .map(|(i, output)| {
                let id = hash_object(&(block_id, "genesis_block_stake", i as u64))?;
                Ok(OutputDiff::apply(OutputId(id), output.clone()))
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        ProcessedBlock::new(
            block,
            0,
            self.root_target,
            coin_output_diffs,
            block_stake_output_diffs,
        )
    }
}
