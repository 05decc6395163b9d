#![allow(dead_code)]

use std::collections::HashMap;

use ccfeed_consensus::{ConsensusConfig, ConsensusSet, ConsensusSetSubscriber};
use ccfeed_core::{
    hash_blake3, Block, BlockStakeOutput, ChangeId, CoinOutput, ConsensusChange, DiffDirection,
    GenesisConfig, OutputDiff, ProcessedBlock, Target, UnlockHash,
};
use ccfeed_store::{MemoryStorage, Storage};
use parking_lot::Mutex;

pub fn owner(name: &str) -> UnlockHash {
    UnlockHash(hash_blake3(name.as_bytes()))
}

pub fn genesis_config() -> GenesisConfig {
    GenesisConfig {
        timestamp: 1_000,
        root_target: Target(hash_blake3(b"root target")),
        coin_outputs: vec![CoinOutput {
            value: 1_000_000,
            unlock_hash: owner("treasury"),
        }],
        block_stake_outputs: vec![BlockStakeOutput {
            value: 100,
            unlock_hash: owner("staker"),
        }],
    }
}

/// A child of `parent` paying each `(owner, value)` pair as a miner payout
pub fn child_block(parent: &ProcessedBlock, timestamp: u64, payouts: &[(&str, u64)]) -> ProcessedBlock {
    let mut block = Block::new(parent.id, timestamp);
    block.miner_payouts = payouts
        .iter()
        .map(|(name, value)| CoinOutput {
            value: *value,
            unlock_hash: owner(name),
        })
        .collect();

    let coin_output_diffs = block
        .miner_payouts
        .iter()
        .enumerate()
        .map(|(i, output)| OutputDiff::apply(block.miner_payout_id(i as u64).unwrap(), output.clone()))
        .collect();
    let stake_id = ccfeed_core::OutputId(hash_blake3(&block.id().unwrap().as_bytes()[..]));
    let block_stake_output_diffs = vec![OutputDiff::apply(
        stake_id,
        BlockStakeOutput {
            value: 1,
            unlock_hash: owner("staker"),
        },
    )];

    ProcessedBlock::new(
        block,
        parent.height + 1,
        parent.child_target,
        coin_output_diffs,
        block_stake_output_diffs,
    )
    .unwrap()
}

pub fn memory_set() -> (ConsensusSet<MemoryStorage>, ProcessedBlock) {
    let config = genesis_config();
    let genesis = config.create_genesis_block().unwrap();
    let cs = ConsensusSet::open(MemoryStorage::new(), &config, ConsensusConfig::default()).unwrap();
    (cs, genesis)
}

/// Store `block` and apply it on top of the current head
pub fn extend<S: Storage>(cs: &ConsensusSet<S>, block: &ProcessedBlock) -> ChangeId {
    cs.add_block(block).unwrap();
    cs.commit_mutation(vec![], vec![block.id]).unwrap().id
}

/// Build and apply `count` blocks on top of `parent`
pub fn grow<S: Storage>(
    cs: &ConsensusSet<S>,
    parent: &ProcessedBlock,
    count: usize,
) -> (Vec<ChangeId>, ProcessedBlock) {
    let mut ids = Vec::with_capacity(count);
    let mut tip = parent.clone();
    for i in 0..count {
        let block = child_block(&tip, tip.timestamp() + 10, &[("miner", 100 + i as u64)]);
        ids.push(extend(cs, &block));
        tip = block;
    }
    (ids, tip)
}

/// Records every change it receives
#[derive(Default)]
pub struct Recorder {
    changes: Mutex<Vec<ConsensusChange>>,
}

impl Recorder {
    pub fn ids(&self) -> Vec<ChangeId> {
        self.changes.lock().iter().map(|c| c.id).collect()
    }

    pub fn changes(&self) -> Vec<ConsensusChange> {
        self.changes.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.changes.lock().len()
    }
}

impl ConsensusSetSubscriber for Recorder {
    fn process_consensus_change(&self, change: &ConsensusChange) {
        self.changes.lock().push(change.clone());
    }
}

/// Derives coin balances per owner from the feed
#[derive(Default)]
pub struct BalanceTracker {
    balances: Mutex<HashMap<UnlockHash, i128>>,
}

impl BalanceTracker {
    pub fn snapshot(&self) -> HashMap<UnlockHash, i128> {
        self.balances
            .lock()
            .iter()
            .filter(|(_, v)| **v != 0)
            .map(|(k, v)| (*k, *v))
            .collect()
    }

    pub fn balance(&self, name: &str) -> i128 {
        self.balances.lock().get(&owner(name)).copied().unwrap_or(0)
    }
}

impl ConsensusSetSubscriber for BalanceTracker {
    fn process_consensus_change(&self, change: &ConsensusChange) {
        let mut balances = self.balances.lock();
        for diff in &change.coin_output_diffs {
            let balance = balances.entry(diff.output.unlock_hash).or_default();
            match diff.direction {
                DiffDirection::Apply => *balance += diff.output.value as i128,
                DiffDirection::Revert => *balance -= diff.output.value as i128,
            }
        }
    }
}
