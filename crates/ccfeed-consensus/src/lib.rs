//! ccfeed Consensus - Consensus change feed
//!
//! This crate turns committed consensus-set mutations into an ordered,
//! replayable stream of [`ConsensusChange`](ccfeed_core::ConsensusChange)
//! values and delivers it to subscribers: computing changes from the
//! changelog, catching new subscribers up from a checkpoint, and
//! broadcasting every new change to the active subscriber set.

pub mod channel;
pub mod compute;
pub mod config;
pub mod consensus_set;
pub mod error;
pub mod registry;
pub mod subscribe;
pub mod subscriber;
pub mod task_group;

pub use channel::ChannelSubscriber;
pub use compute::{compute_consensus_change, minimum_valid_child_timestamp};
pub use config::{ConsensusConfig, MEDIAN_TIMESTAMP_WINDOW};
pub use consensus_set::ConsensusSet;
pub use error::ConsensusError;
pub use registry::{ActiveSubscribers, SubscriberHandle, SubscriberRegistry};
pub use subscriber::ConsensusSetSubscriber;
pub use task_group::{TaskGroup, TaskGuard};
pub use tokio_util::sync::CancellationToken;
