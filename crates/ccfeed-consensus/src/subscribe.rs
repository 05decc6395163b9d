//! Catch-up: bring a subscriber from its checkpoint to the changelog tail.

use ccfeed_core::{ChangeEntry, Checkpoint};
use ccfeed_store::{ChainDb, Storage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::compute::compute_consensus_change;
use crate::error::ConsensusError;
use crate::subscriber::ConsensusSetSubscriber;

/// Feed `subscriber` every change after `start`, in changelog order.
///
/// Returns the number of changes delivered. `cancel` is checked before each
/// delivery; once it fires the catch-up stops with
/// [`ConsensusError::SubscribeAborted`].
pub fn catch_up<S: Storage>(
    db: &ChainDb<S>,
    subscriber: &dyn ConsensusSetSubscriber,
    start: Checkpoint,
    cancel: &CancellationToken,
    node_synced: bool,
    median_timestamp_window: usize,
) -> Result<usize, ConsensusError> {
    let mut next = first_unseen(db, start)?;

    let mut delivered = 0;
    while let Some(entry) = next {
        if cancel.is_cancelled() {
            warn!("Catch-up cancelled after {} changes", delivered);
            return Err(ConsensusError::SubscribeAborted);
        }
        let change = compute_consensus_change(db, &entry, node_synced, median_timestamp_window)?;
        subscriber.process_consensus_change(&change);
        delivered += 1;
        next = db.next_change(&entry)?;
    }

    debug!("Catch-up from {} delivered {} changes", start, delivered);
    Ok(delivered)
}

/// The first entry the subscriber has not seen yet, if any
fn first_unseen<S: Storage>(
    db: &ChainDb<S>,
    start: Checkpoint,
) -> Result<Option<ChangeEntry>, ConsensusError> {
    match start {
        Checkpoint::Beginning => Ok(Some(db.genesis_change()?)),
        Checkpoint::Recent => Ok(None),
        Checkpoint::At(id) => {
            let seen = db.resolve_change(&id)?.ok_or_else(|| {
                warn!("Checkpoint {} not found in the changelog", id);
                ConsensusError::InvalidConsensusChangeId(id)
            })?;
            Ok(db.next_change(&seen)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccfeed_core::{hash_blake3, Block, BlockId, ChangeId, ConsensusChange, ProcessedBlock, Target};
    use ccfeed_store::MemoryStorage;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<ChangeId>>);

    impl ConsensusSetSubscriber for Recorder {
        fn process_consensus_change(&self, change: &ConsensusChange) {
            self.0.lock().push(change.id);
        }
    }

    fn setup(blocks: usize) -> (ChainDb<MemoryStorage>, Vec<ChangeId>) {
        let mut parent = ProcessedBlock::new(
            Block::new(BlockId::default(), 100),
            0,
            Target(hash_blake3(b"root")),
            Vec::new(),
            Vec::new(),
        )
        .unwrap();
        let mut db = ChainDb::new(MemoryStorage::new());
        let mut ids = vec![db.init_genesis(&parent).unwrap().id];

        for i in 0..blocks {
            let block = ProcessedBlock::new(
                Block::new(parent.id, 110 + i as u64),
                parent.height + 1,
                parent.child_target,
                Vec::new(),
                Vec::new(),
            )
            .unwrap();
            db.put_block(&block).unwrap();
            ids.push(db.commit_mutation(vec![], vec![block.id]).unwrap().id);
            parent = block;
        }
        (db, ids)
    }

    #[test]
    fn test_checkpoint_skips_seen_change() {
        let (db, ids) = setup(3);
        let recorder = Recorder::default();

        let delivered = catch_up(
            &db,
            &recorder,
            Checkpoint::At(ids[1]),
            &CancellationToken::new(),
            true,
            11,
        )
        .unwrap();

        assert_eq!(delivered, 2);
        assert_eq!(*recorder.0.lock(), ids[2..].to_vec());
    }

    #[test]
    fn test_tail_checkpoint_delivers_nothing() {
        let (db, ids) = setup(2);
        let recorder = Recorder::default();

        let delivered = catch_up(
            &db,
            &recorder,
            Checkpoint::At(ids[2]),
            &CancellationToken::new(),
            true,
            11,
        )
        .unwrap();
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let (db, _) = setup(2);
        let recorder = Recorder::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = catch_up(&db, &recorder, Checkpoint::Beginning, &cancel, true, 11);
        assert!(matches!(result, Err(ConsensusError::SubscribeAborted)));
        assert!(recorder.0.lock().is_empty());
    }

    #[test]
    fn test_unknown_checkpoint() {
        let (db, _) = setup(1);
        let bogus = ChangeId(hash_blake3(b"bogus"));

        let result = catch_up(
            &db,
            &Recorder::default(),
            Checkpoint::At(bogus),
            &CancellationToken::new(),
            true,
            11,
        );
        assert!(matches!(result, Err(ConsensusError::InvalidConsensusChangeId(id)) if id == bogus));
    }
}
