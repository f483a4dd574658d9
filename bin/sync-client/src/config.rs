use std::{
    fmt::{Display, Formatter},
    time::Duration,
};

use rollup_sync_block_source::{BlockSourceConfig, LocalProducerConfig};
use serde::{Deserialize, Serialize};

// Client config
// ================================================================================================

/// Configuration of the `follow` command.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    pub block_source: BlockSourceConfig,
    pub producer: LocalProducerConfig,
    pub simulation: SimulationConfig,
}

impl Display for ClientConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{{ block_source: {}, producer: {}, simulation: {} }}",
            self.block_source, self.producer, self.simulation
        ))
    }
}

// Simulation config
// ================================================================================================

/// Drives the local block producer.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimulationConfig {
    /// Interval between two produced blocks, in milliseconds.
    pub block_interval_ms: u64,

    /// Number of blocks produced before the client starts following the chain.
    pub genesis_blocks: u32,
}

impl SimulationConfig {
    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms.max(1))
    }
}

impl Display for SimulationConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "{{ block_interval_ms: {}, genesis_blocks: {} }}",
            self.block_interval_ms, self.genesis_blocks
        ))
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { block_interval_ms: 1_000, genesis_blocks: 16 }
    }
}
