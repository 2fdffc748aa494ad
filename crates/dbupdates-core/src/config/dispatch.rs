use serde::{Deserialize, Serialize};

/// Configuration for the dispatch loop feeding the processors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Capacity of each per-partition batch channel
    /// Default: 64
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Maximum number of records grouped into one batch by ingestion
    /// Default: 256
    #[serde(default = "default_max_batch_records")]
    pub max_batch_records: usize,
}

fn default_channel_capacity() -> usize {
    64
}

fn default_max_batch_records() -> usize {
    256
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            max_batch_records: default_max_batch_records(),
        }
    }
}

impl DispatchConfig {
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_max_batch_records(mut self, max: usize) -> Self {
        self.max_batch_records = max;
        self
    }
}
