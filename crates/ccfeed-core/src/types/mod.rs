pub mod block;
pub mod change;
pub mod diff;

pub use block::{Block, BlockId, GenesisConfig, ProcessedBlock, Target, Timestamp};
pub use change::{ChangeEntry, ChangeId, Checkpoint, ConsensusChange};
pub use diff::{
    BlockStakeOutput, BlockStakeOutputDiff, CoinOutput, CoinOutputDiff, DiffDirection, OutputDiff,
    OutputId, UnlockHash,
};
