use ccfeed_core::{
    BlockId, ChangeEntry, ConsensusChange, OutputDiff, ProcessedBlock, Target, Timestamp,
};
use ccfeed_store::{ChainDb, Storage};
use tracing::error;

use crate::error::ConsensusError;

/// Hydrate the consensus change for `entry`.
///
/// Reverted blocks are walked newest first and each of their diffs is
/// emitted in reverse with its direction flipped; applied blocks follow in
/// order with their diffs as stored. `synced` is only set when the node is
/// caught up with the network and the entry ends on the current head.
pub fn compute_consensus_change<S: Storage>(
    db: &ChainDb<S>,
    entry: &ChangeEntry,
    node_synced: bool,
    median_timestamp_window: usize,
) -> Result<ConsensusChange, ConsensusError> {
    let mut change = ConsensusChange {
        id: entry.id,
        reverted_blocks: Vec::with_capacity(entry.reverted_blocks.len()),
        applied_blocks: Vec::with_capacity(entry.applied_blocks.len()),
        coin_output_diffs: Vec::new(),
        block_stake_output_diffs: Vec::new(),
        child_target: Target::default(),
        minimum_valid_child_timestamp: 0,
        synced: false,
    };

    for id in entry.reverted_blocks.iter().rev() {
        let reverted = lookup_block(db, entry, id)?;
        change.coin_output_diffs.extend(
            reverted
                .coin_output_diffs
                .iter()
                .rev()
                .map(OutputDiff::reversed),
        );
        change.block_stake_output_diffs.extend(
            reverted
                .block_stake_output_diffs
                .iter()
                .rev()
                .map(OutputDiff::reversed),
        );
        change.reverted_blocks.push(reverted.block);
    }

    let mut recent: Option<ProcessedBlock> = None;
    for id in &entry.applied_blocks {
        let applied = lookup_block(db, entry, id)?;
        change
            .coin_output_diffs
            .extend(applied.coin_output_diffs.iter().cloned());
        change
            .block_stake_output_diffs
            .extend(applied.block_stake_output_diffs.iter().cloned());
        change.applied_blocks.push(applied.block.clone());
        recent = Some(applied);
    }

    let recent = recent.ok_or(ConsensusError::EmptyChange(entry.id))?;
    change.child_target = recent.child_target;
    change.minimum_valid_child_timestamp =
        minimum_valid_child_timestamp(db, &recent, median_timestamp_window)?;
    change.synced = node_synced && db.current_block_id()? == recent.id;

    Ok(change)
}

/// Earliest timestamp a child of `block` may carry: the median of the
/// timestamps of `block` and its ancestors over a window of `window` blocks.
///
/// Near genesis the window is padded with the genesis timestamp.
pub fn minimum_valid_child_timestamp<S: Storage>(
    db: &ChainDb<S>,
    block: &ProcessedBlock,
    window: usize,
) -> Result<Timestamp, ConsensusError> {
    let window = window.max(1);
    let mut timestamps = Vec::with_capacity(window);
    timestamps.push(block.timestamp());

    let mut earliest = block.timestamp();
    let mut parent_id = (!block.is_genesis()).then(|| block.parent_id());
    while timestamps.len() < window {
        let Some(id) = parent_id else { break };
        let parent = db.get_block(&id)?.ok_or_else(|| {
            error!("Ancestor {} of block {} is missing from the block store", id, block.id);
            ConsensusError::MissingBlock(id)
        })?;
        timestamps.push(parent.timestamp());
        earliest = parent.timestamp();
        parent_id = (!parent.is_genesis()).then(|| parent.parent_id());
    }

    timestamps.resize(window, earliest);
    timestamps.sort_unstable();
    Ok(timestamps[window / 2])
}

fn lookup_block<S: Storage>(
    db: &ChainDb<S>,
    entry: &ChangeEntry,
    id: &BlockId,
) -> Result<ProcessedBlock, ConsensusError> {
    db.get_block(id)?.ok_or_else(|| {
        error!(
            "Block {} referenced by change {} is missing from the block store",
            id, entry.id
        );
        ConsensusError::MissingBlock(*id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccfeed_core::{
        hash_blake3, Block, CoinOutput, CoinOutputDiff, DiffDirection, OutputId, UnlockHash,
    };
    use ccfeed_store::MemoryStorage;

    fn coin_diff(seed: &str, value: u64) -> CoinOutputDiff {
        OutputDiff::apply(
            OutputId(hash_blake3(seed.as_bytes())),
            CoinOutput {
                value,
                unlock_hash: UnlockHash(hash_blake3(b"owner")),
            },
        )
    }

    fn make_block(parent: &ProcessedBlock, timestamp: u64, diffs: &[&str]) -> ProcessedBlock {
        ProcessedBlock::new(
            Block::new(parent.id, timestamp),
            parent.height + 1,
            Target(hash_blake3(&timestamp.to_le_bytes())),
            diffs.iter().map(|seed| coin_diff(seed, 10)).collect(),
            Vec::new(),
        )
        .unwrap()
    }

    fn setup() -> (ChainDb<MemoryStorage>, ProcessedBlock) {
        let genesis = ProcessedBlock::new(
            Block::new(BlockId::default(), 100),
            0,
            Target(hash_blake3(b"root")),
            vec![coin_diff("genesis", 1000)],
            Vec::new(),
        )
        .unwrap();
        let mut db = ChainDb::new(MemoryStorage::new());
        db.init_genesis(&genesis).unwrap();
        (db, genesis)
    }

    #[test]
    fn test_reverted_diffs_reversed_and_flipped() {
        let (mut db, genesis) = setup();
        let b1 = make_block(&genesis, 110, &["b1-a", "b1-b"]);
        let b2 = make_block(&b1, 120, &["b2-a"]);
        let b1_alt = make_block(&genesis, 111, &["alt-a"]);
        for b in [&b1, &b2, &b1_alt] {
            db.put_block(b).unwrap();
        }
        db.commit_mutation(vec![], vec![b1.id, b2.id]).unwrap();
        let entry = db.commit_mutation(vec![b1.id, b2.id], vec![b1_alt.id]).unwrap();

        let change = compute_consensus_change(&db, &entry, false, 11).unwrap();

        assert_eq!(change.reverted_blocks, vec![b2.block.clone(), b1.block.clone()]);
        assert_eq!(change.applied_blocks, vec![b1_alt.block.clone()]);
        let ids: Vec<_> = change.coin_output_diffs.iter().map(|d| d.id).collect();
        assert_eq!(
            ids,
            vec![
                b2.coin_output_diffs[0].id,
                b1.coin_output_diffs[1].id,
                b1.coin_output_diffs[0].id,
                b1_alt.coin_output_diffs[0].id,
            ]
        );
        let directions: Vec<_> = change.coin_output_diffs.iter().map(|d| d.direction).collect();
        assert_eq!(
            directions,
            vec![
                DiffDirection::Revert,
                DiffDirection::Revert,
                DiffDirection::Revert,
                DiffDirection::Apply,
            ]
        );
        assert_eq!(change.child_target, b1_alt.child_target);
        assert!(change.is_reorg());
    }

    #[test]
    fn test_synced_requires_head_and_flag() {
        let (mut db, genesis) = setup();
        let b1 = make_block(&genesis, 110, &[]);
        db.put_block(&b1).unwrap();
        let genesis_entry = db.genesis_change().unwrap();
        let e1 = db.commit_mutation(vec![], vec![b1.id]).unwrap();

        assert!(compute_consensus_change(&db, &e1, true, 11).unwrap().synced);
        assert!(!compute_consensus_change(&db, &e1, false, 11).unwrap().synced);
        assert!(!compute_consensus_change(&db, &genesis_entry, true, 11).unwrap().synced);
    }

    #[test]
    fn test_missing_block_is_fault() {
        let (db, _) = setup();
        let ghost = BlockId(hash_blake3(b"ghost"));
        let entry = ChangeEntry::new(None, Vec::new(), vec![ghost]).unwrap();

        let result = compute_consensus_change(&db, &entry, true, 11);
        assert!(matches!(result, Err(ConsensusError::MissingBlock(id)) if id == ghost));
    }

    #[test]
    fn test_empty_entry_rejected() {
        let (db, _) = setup();
        let entry = ChangeEntry::new(None, Vec::new(), Vec::new()).unwrap();

        let result = compute_consensus_change(&db, &entry, true, 11);
        assert!(matches!(result, Err(ConsensusError::EmptyChange(_))));
    }

    #[test]
    fn test_median_timestamp_pads_with_genesis() {
        let (mut db, genesis) = setup();
        let b1 = make_block(&genesis, 300, &[]);
        let b2 = make_block(&b1, 400, &[]);
        db.put_block(&b1).unwrap();
        db.put_block(&b2).unwrap();

        // window of 5: [400, 300, 100, 100, 100] -> median 100
        assert_eq!(minimum_valid_child_timestamp(&db, &b2, 5).unwrap(), 100);
        // window of 3: [400, 300, 100] -> median 300
        assert_eq!(minimum_valid_child_timestamp(&db, &b2, 3).unwrap(), 300);
        assert_eq!(minimum_valid_child_timestamp(&db, &genesis, 11).unwrap(), 100);
    }

    #[test]
    fn test_median_timestamp_full_window() {
        let (mut db, genesis) = setup();
        let mut parent = genesis;
        for ts in [150, 120, 180, 170, 160] {
            let block = make_block(&parent, ts, &[]);
            db.put_block(&block).unwrap();
            parent = block;
        }

        // last three: [160, 170, 180] -> median 170
        assert_eq!(minimum_valid_child_timestamp(&db, &parent, 3).unwrap(), 170);
    }
}
