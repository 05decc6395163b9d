/// Number of ancestor timestamps whose median bounds a child's timestamp
pub const MEDIAN_TIMESTAMP_WINDOW: usize = 11;

/// Configuration for the consensus set
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    /// Blocks considered when deriving the minimum valid child timestamp
    pub median_timestamp_window: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        ConsensusConfig {
            median_timestamp_window: MEDIAN_TIMESTAMP_WINDOW,
        }
    }
}
