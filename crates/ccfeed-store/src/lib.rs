//! ccfeed Store - Chain database
//!
//! This crate persists processed blocks, the chain head and the append-only
//! changelog on top of a small key-value storage abstraction.

pub mod changelog;
pub mod db;
pub mod error;
pub mod storage;

pub use changelog::ChangeNode;
pub use db::ChainDb;
pub use error::StoreError;
pub use storage::{FileStorage, MemoryStorage, Storage};
