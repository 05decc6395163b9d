use ccfeed_core::ConsensusChange;

/// Receiver of the consensus change feed.
///
/// Changes arrive one at a time, in changelog order, with no gaps or
/// repeats. Delivery is synchronous: the consensus set waits for
/// `process_consensus_change` to return before it moves on, so
/// implementations must not block for long or call back into
/// `subscribe`/`unsubscribe`.
pub trait ConsensusSetSubscriber: Send + Sync {
    fn process_consensus_change(&self, change: &ConsensusChange);
}

impl<F> ConsensusSetSubscriber for F
where
    F: Fn(&ConsensusChange) + Send + Sync,
{
    fn process_consensus_change(&self, change: &ConsensusChange) {
        self(change)
    }
}
