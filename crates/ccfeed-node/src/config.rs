use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use ccfeed_consensus::{ConsensusConfig, MEDIAN_TIMESTAMP_WINDOW};
use ccfeed_core::{
    hash_blake3, BlockStakeOutput, Checkpoint, CoinOutput, GenesisConfig, Target, UnlockHash,
};
use serde::{Deserialize, Serialize};

/// Node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node data directory
    pub data_dir: PathBuf,

    /// Genesis configuration
    pub genesis: GenesisConfigFile,

    /// Ancestor blocks used for the minimum valid child timestamp
    pub median_timestamp_window: usize,

    /// Where `run` starts following the feed: "beginning", "recent" or a
    /// change id in hex
    pub follow_from: String,

    /// Changes buffered between the consensus set and the follower
    pub channel_capacity: usize,
}

/// Genesis configuration for file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisConfigFile {
    pub timestamp: u64,
    /// Hex encoded
    pub root_target: String,
    pub coin_outputs: Vec<OutputEntry>,
    pub block_stake_outputs: Vec<OutputEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEntry {
    pub unlock_hash: String,
    pub value: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            data_dir: PathBuf::from("./ccfeed-data"),
            genesis: GenesisConfigFile::default(),
            median_timestamp_window: MEDIAN_TIMESTAMP_WINDOW,
            follow_from: Checkpoint::Recent.to_string(),
            channel_capacity: 64,
        }
    }
}

impl Default for GenesisConfigFile {
    fn default() -> Self {
        GenesisConfigFile {
            timestamp: 0,
            root_target: Target::default().to_hex(),
            coin_outputs: vec![],
            block_stake_outputs: vec![],
        }
    }
}

impl NodeConfig {
    /// Load config from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: NodeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path of the chain database inside the data directory
    pub fn chain_db_path(&self) -> PathBuf {
        self.data_dir.join("chain.db")
    }

    pub fn consensus_config(&self) -> ConsensusConfig {
        ConsensusConfig {
            median_timestamp_window: self.median_timestamp_window,
        }
    }

    pub fn follow_checkpoint(&self) -> Result<Checkpoint> {
        self.follow_from
            .parse()
            .with_context(|| format!("invalid follow_from checkpoint {:?}", self.follow_from))
    }

    /// Convert genesis config to core type
    pub fn to_genesis_config(&self) -> Result<GenesisConfig> {
        let coin_outputs = self
            .genesis
            .coin_outputs
            .iter()
            .map(|entry| {
                Ok(CoinOutput {
                    value: entry.value,
                    unlock_hash: UnlockHash::from_hex(&entry.unlock_hash)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let block_stake_outputs = self
            .genesis
            .block_stake_outputs
            .iter()
            .map(|entry| {
                Ok(BlockStakeOutput {
                    value: entry.value,
                    unlock_hash: UnlockHash::from_hex(&entry.unlock_hash)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(GenesisConfig {
            timestamp: self.genesis.timestamp,
            root_target: Target::from_hex(&self.genesis.root_target)?,
            coin_outputs,
            block_stake_outputs,
        })
    }
}

/// Generate a sample configuration for testing
pub fn generate_sample_config() -> NodeConfig {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    NodeConfig {
        genesis: GenesisConfigFile {
            timestamp,
            root_target: hash_blake3(b"ccfeed root target").to_hex(),
            coin_outputs: vec![OutputEntry {
                unlock_hash: hash_blake3(b"ccfeed sample treasury").to_hex(),
                value: 1_000_000_000,
            }],
            block_stake_outputs: vec![OutputEntry {
                unlock_hash: hash_blake3(b"ccfeed sample staker").to_hex(),
                value: 3_000,
            }],
        },
        ..NodeConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.median_timestamp_window, 11);
        assert_eq!(config.follow_checkpoint().unwrap(), Checkpoint::Recent);
    }

    #[test]
    fn test_genesis_conversion() {
        let config = generate_sample_config();
        let genesis = config.to_genesis_config().unwrap();
        assert_eq!(genesis.coin_outputs.len(), 1);
        assert_eq!(genesis.block_stake_outputs[0].value, 3_000);
        assert_eq!(genesis.root_target.to_hex(), config.genesis.root_target);
    }

    #[test]
    fn test_bad_unlock_hash_rejected() {
        let mut config = generate_sample_config();
        config.genesis.coin_outputs[0].unlock_hash = "abcd".to_string();
        assert!(config.to_genesis_config().is_err());
    }

    #[test]
    fn test_bad_checkpoint_rejected() {
        let config = NodeConfig {
            follow_from: "yesterday".to_string(),
            ..NodeConfig::default()
        };
        assert!(config.follow_checkpoint().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = generate_sample_config();
        config.save(&path).unwrap();

        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded.genesis.timestamp, config.genesis.timestamp);
        assert_eq!(loaded.chain_db_path(), config.chain_db_path());
    }
}
