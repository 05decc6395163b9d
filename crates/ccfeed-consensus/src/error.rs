use ccfeed_core::{BlockId, ChangeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsensusError {
    /// The checkpoint is not in the changelog. The subscriber is out of sync
    /// with the consensus set and has to rescan from the beginning.
    #[error("Consensus change id {0} is unknown; rescan from the beginning")]
    InvalidConsensusChangeId(ChangeId),

    #[error("Subscription aborted during catch-up")]
    SubscribeAborted,

    /// A changelog entry references a block the block store does not have.
    #[error("Block {0} is referenced by the changelog but missing from the block store")]
    MissingBlock(BlockId),

    #[error("Change entry {0} applies no blocks")]
    EmptyChange(ChangeId),

    #[error("Consensus set is shutting down and not accepting operations")]
    Stopped,

    /// The mutation was committed but its change could not be delivered.
    #[error("Change {change} committed but not broadcast: {source}")]
    Broadcast {
        change: ChangeId,
        #[source]
        source: Box<ConsensusError>,
    },

    #[error("Genesis mismatch: database has {stored}, configuration expects {configured}")]
    GenesisMismatch { stored: BlockId, configured: BlockId },

    #[error("Store error: {0}")]
    Store(#[from] ccfeed_store::StoreError),

    #[error("Core error: {0}")]
    Core(#[from] ccfeed_core::CoreError),
}

impl ConsensusError {
    /// Whether the caller has to discard its checkpoint and resubscribe
    /// from [`Checkpoint::Beginning`](ccfeed_core::Checkpoint::Beginning)
    pub fn requires_rescan(&self) -> bool {
        matches!(self, ConsensusError::InvalidConsensusChangeId(_))
    }
}
