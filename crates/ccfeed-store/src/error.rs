use ccfeed_core::{BlockId, ChangeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Block not found: {0}")]
    BlockNotFound(BlockId),

    #[error("Change entry not found: {0}")]
    ChangeNotFound(ChangeId),

    #[error("Change entry already exists: {0}")]
    ChangeExists(ChangeId),

    #[error("Mutation applies no blocks")]
    EmptyMutation,

    #[error("Chain database has no genesis block")]
    Uninitialized,

    #[error("Chain database already initialized")]
    AlreadyInitialized,

    #[error("Core error: {0}")]
    Core(#[from] ccfeed_core::CoreError),
}
