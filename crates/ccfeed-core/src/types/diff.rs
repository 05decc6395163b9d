use std::ops::Not;

use serde::{Deserialize, Serialize};

use crate::hash::hash_id;

hash_id!(
    /// Identifier of a coin or block stake output
    OutputId
);

hash_id!(
    /// Hash of the conditions required to spend an output
    UnlockHash
);

/// Polarity of an output diff.
///
/// `Apply` means the diff is being played forward (the output is created);
/// `Revert` is its exact inverse. Stored diffs always carry the direction they
/// had when their block was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffDirection {
    Apply,
    Revert,
}

impl DiffDirection {
    pub fn flip(self) -> Self {
        match self {
            DiffDirection::Apply => DiffDirection::Revert,
            DiffDirection::Revert => DiffDirection::Apply,
        }
    }
}

impl Not for DiffDirection {
    type Output = DiffDirection;

    fn not(self) -> Self::Output {
        self.flip()
    }
}

/// A coin output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinOutput {
    pub value: u64,
    pub unlock_hash: UnlockHash,
}

/// A block stake output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStakeOutput {
    pub value: u64,
    pub unlock_hash: UnlockHash,
}

/// Creation (or, reversed, destruction) of one output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDiff<T> {
    pub direction: DiffDirection,
    pub id: OutputId,
    pub output: T,
}

pub type CoinOutputDiff = OutputDiff<CoinOutput>;
pub type BlockStakeOutputDiff = OutputDiff<BlockStakeOutput>;

impl<T> OutputDiff<T> {
    pub fn apply(id: OutputId, output: T) -> Self {
        OutputDiff {
            direction: DiffDirection::Apply,
            id,
            output,
        }
    }

    pub fn revert(id: OutputId, output: T) -> Self {
        OutputDiff {
            direction: DiffDirection::Revert,
            id,
            output,
        }
    }
}

impl<T: Clone> OutputDiff<T> {
    /// The same diff with its direction inverted
    pub fn reversed(&self) -> Self {
        OutputDiff {
            direction: !self.direction,
            id: self.id,
            output: self.output.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_blake3;

    fn coin_diff(seed: &[u8], value: u64) -> CoinOutputDiff {
        OutputDiff::apply(
            OutputId(hash_blake3(seed)),
            CoinOutput {
                value,
                unlock_hash: UnlockHash(hash_blake3(b"owner")),
            },
        )
    }

    #[test]
    fn test_flip_is_involutive() {
        for direction in [DiffDirection::Apply, DiffDirection::Revert] {
            assert_ne!(direction.flip(), direction);
            assert_eq!(direction.flip().flip(), direction);
            assert_eq!(!!direction, direction);
        }
    }

    #[test]
    fn test_reversed_keeps_content() {
        let diff = coin_diff(b"out-1", 42);
        let reversed = diff.reversed();

        assert_eq!(reversed.direction, DiffDirection::Revert);
        assert_eq!(reversed.id, diff.id);
        assert_eq!(reversed.output, diff.output);
        assert_eq!(reversed.reversed(), diff);
    }

    #[test]
    fn test_direction_json_form() {
        let json = serde_json::to_string(&DiffDirection::Revert).unwrap();
        assert_eq!(json, "\"revert\"");
    }
}
