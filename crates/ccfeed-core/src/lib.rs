//! ccfeed Core - Identifiers, blocks, diffs and consensus changes
//!
//! This crate provides the value types shared by the chain database and the
//! consensus change feed, together with the hashing and serialization helpers
//! that derive their identifiers.

pub mod error;
pub mod hash;
pub mod serialize;
pub mod types;

pub use error::CoreError;
pub use hash::{hash_blake3, hash_object, Hash};
pub use types::*;
