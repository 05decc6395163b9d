use std::sync::Arc;

use ccfeed_core::ConsensusChange;
use tokio::sync::mpsc;
use tracing::warn;

use crate::subscriber::ConsensusSetSubscriber;

/// Subscriber that hands every change to an async consumer over a bounded
/// channel.
///
/// When the channel is full, delivery blocks until the consumer catches up,
/// so no change is dropped and order is kept; a slow consumer therefore
/// stalls the consensus set just like a slow synchronous subscriber would.
/// Deliveries happen on the thread that commits or subscribes, which must
/// not be a runtime worker: run those calls through
/// `tokio::task::spawn_blocking` or a plain thread.
pub struct ChannelSubscriber {
    sender: mpsc::Sender<ConsensusChange>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<ConsensusChange>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Arc::new(ChannelSubscriber { sender }), receiver)
    }

    /// Whether the receiving side has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl ConsensusSetSubscriber for ChannelSubscriber {
    fn process_consensus_change(&self, change: &ConsensusChange) {
        if self.sender.blocking_send(change.clone()).is_err() {
            warn!("Dropping change {}: channel receiver closed", change.id);
        }
    }
}
