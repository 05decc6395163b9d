use std::sync::atomic::{AtomicBool, Ordering};

use ccfeed_core::{
    BlockId, ChangeEntry, ChangeId, Checkpoint, ConsensusChange, GenesisConfig, ProcessedBlock,
};
use ccfeed_store::{ChainDb, Storage, StoreError};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::compute::compute_consensus_change;
use crate::config::ConsensusConfig;
use crate::error::ConsensusError;
use crate::registry::{SubscriberHandle, SubscriberRegistry};
use crate::subscribe::catch_up;

/// The consensus set as seen by the change feed.
///
/// The consensus engine reports every committed mutation through
/// [`ConsensusSet::commit_mutation`]; consumers follow the resulting changes
/// through [`ConsensusSet::subscribe`].
///
/// Lock order is registry first, database second. Mutations, catch-ups and
/// broadcasts all run inside the registry lock, so a subscriber's catch-up
/// and the live feed never overlap.
pub struct ConsensusSet<S: Storage> {
    db: RwLock<ChainDb<S>>,
    registry: SubscriberRegistry,
    synced: AtomicBool,
    config: ConsensusConfig,
}

impl<S: Storage> ConsensusSet<S> {
    /// Wrap an initialized chain database
    pub fn new(db: ChainDb<S>, config: ConsensusConfig) -> Result<Self, ConsensusError> {
        if !db.is_initialized() {
            return Err(StoreError::Uninitialized.into());
        }
        Ok(ConsensusSet {
            db: RwLock::new(db),
            registry: SubscriberRegistry::new(),
            synced: AtomicBool::new(false),
            config,
        })
    }

    /// Open the chain database in `storage`, writing the genesis block on
    /// first use and checking it against `genesis` afterwards
    pub fn open(
        storage: S,
        genesis: &GenesisConfig,
        config: ConsensusConfig,
    ) -> Result<Self, ConsensusError> {
        let mut db = ChainDb::new(storage);
        let genesis_block = genesis.create_genesis_block()?;

        if db.is_initialized() {
            let stored = db.genesis_block_id()?;
            if stored != genesis_block.id {
                return Err(ConsensusError::GenesisMismatch {
                    stored,
                    configured: genesis_block.id,
                });
            }
            info!(
                "Resuming consensus set at height {} ({} changes)",
                db.height()?,
                db.change_count()
            );
        } else {
            db.init_genesis(&genesis_block)?;
        }

        ConsensusSet::new(db, config)
    }

    /// Store a processed block so a later mutation can apply or revert it.
    /// Blocks already in the store are left as they are.
    pub fn add_block(&self, block: &ProcessedBlock) -> Result<(), ConsensusError> {
        let mut db = self.db.write();
        if !db.has_block(&block.id) {
            db.put_block(block)?;
        }
        Ok(())
    }

    /// Record a committed mutation and broadcast the resulting change.
    ///
    /// If the change cannot be computed the mutation stays committed and
    /// [`ConsensusError::Broadcast`] is returned.
    pub fn commit_mutation(
        &self,
        reverted: Vec<BlockId>,
        applied: Vec<BlockId>,
    ) -> Result<ChangeEntry, ConsensusError> {
        self.registry.exclusive(|active| {
            let entry = self.db.write().commit_mutation(reverted, applied)?;

            let change = {
                let db = self.db.read();
                compute_consensus_change(
                    &db,
                    &entry,
                    self.synced(),
                    self.config.median_timestamp_window,
                )
            };

            match change {
                Ok(change) => {
                    active.broadcast(&change);
                    Ok(entry)
                }
                Err(e) => {
                    error!("Computing change {} for broadcast failed: {}", entry.id, e);
                    Err(ConsensusError::Broadcast {
                        change: entry.id,
                        source: Box::new(e),
                    })
                }
            }
        })
    }

    /// Feed `subscriber` every change after `start`, then add it to the
    /// live feed.
    ///
    /// Blocks until catch-up is done. On error the subscriber is not
    /// registered; [`ConsensusError::InvalidConsensusChangeId`] means the
    /// checkpoint is gone and the subscriber has to rescan from
    /// [`Checkpoint::Beginning`].
    pub fn subscribe(
        &self,
        subscriber: SubscriberHandle,
        start: Checkpoint,
        cancel: &CancellationToken,
    ) -> Result<(), ConsensusError> {
        self.registry.subscribe(subscriber, |subscriber| {
            let db = self.db.read();
            let delivered = catch_up(
                &db,
                subscriber,
                start,
                cancel,
                self.synced(),
                self.config.median_timestamp_window,
            )?;
            info!("Subscriber caught up from {} with {} changes", start, delivered);
            Ok(())
        })
    }

    /// Remove `subscriber` from the live feed; no-op if it is not subscribed
    pub fn unsubscribe(&self, subscriber: &SubscriberHandle) -> Result<(), ConsensusError> {
        self.registry.unsubscribe(subscriber)
    }

    /// Compute the change for a single changelog entry
    pub fn consensus_change(&self, id: &ChangeId) -> Result<ConsensusChange, ConsensusError> {
        let db = self.db.read_recursive();
        let entry = db
            .resolve_change(id)?
            .ok_or(ConsensusError::InvalidConsensusChangeId(*id))?;
        compute_consensus_change(
            &db,
            &entry,
            self.synced(),
            self.config.median_timestamp_window,
        )
    }

    /// Mark whether the node is caught up with the network
    pub fn set_synced(&self, synced: bool) {
        self.synced.store(synced, Ordering::SeqCst);
    }

    pub fn synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    pub fn current_block(&self) -> Result<ProcessedBlock, ConsensusError> {
        Ok(self.db.read_recursive().current_block()?)
    }

    pub fn height(&self) -> Result<u64, ConsensusError> {
        Ok(self.db.read_recursive().height()?)
    }

    /// The changelog entry that applies the genesis block
    pub fn genesis_change(&self) -> Result<ChangeEntry, ConsensusError> {
        Ok(self.db.read_recursive().genesis_change()?)
    }

    pub fn change_log_tail(&self) -> Result<ChangeId, ConsensusError> {
        Ok(self.db.read_recursive().change_log_tail()?)
    }

    pub fn change_count(&self) -> usize {
        self.db.read_recursive().change_count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    /// Stop accepting subscriptions and mutations, waiting for the ones in
    /// flight to finish
    pub fn close(&self) {
        if self.registry.close() {
            info!("Consensus set closed");
        }
    }
}
