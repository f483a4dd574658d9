use std::{
    fmt::{Display, Formatter},
    str::FromStr,
    time::SystemTime,
};

use serde::{Deserialize, Serialize};

// ROLLUP ID
// =================================================================================================

/// Position of a block in the rollup chain.
///
/// Rollup ids are assigned by the block producer, start at [`RollupId::GENESIS`] and increase by
/// exactly one per block.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RollupId(u32);

impl RollupId {
    pub const GENESIS: Self = Self(0);

    /// The highest representable rollup id. It has no child.
    pub const MAX: Self = Self(u32::MAX);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the id of the block following this one, or `None` for [`RollupId::MAX`].
    pub fn child(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    /// Returns the id of the block preceding this one, or `None` for genesis.
    pub fn parent(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl From<u32> for RollupId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<RollupId> for u32 {
    fn from(id: RollupId) -> Self {
        id.0
    }
}

impl Display for RollupId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

// TX HASH
// =================================================================================================

/// Content addressed identifier of the rollup transaction which produced a block.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TxHash([u8; 32]);

impl TxHash {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl Display for TxHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for TxHash {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim_start_matches("0x"), &mut bytes)?;
        Ok(Self(bytes))
    }
}

// DEFI INTERACTION NOTE
// =================================================================================================

/// Outcome of an asynchronous cross-domain interaction settled by a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefiInteractionNote {
    /// Identifies the bridge contract the interaction was routed through.
    pub bridge_id: u64,
    /// Interaction nonce. Notes within a block are ordered by this value.
    pub nonce: u32,
    pub total_input_value: u128,
    pub total_output_value_a: u128,
    pub total_output_value_b: u128,
    /// Whether the interaction succeeded.
    pub result: bool,
}

// BLOCK
// =================================================================================================

/// A produced rollup block.
///
/// Blocks are created by the block producer and relayed unchanged: the proof and viewing key
/// payloads are never interpreted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub tx_hash: TxHash,
    pub created: SystemTime,
    pub rollup_id: RollupId,
    /// Number of transactions aggregated into the block.
    pub rollup_size: u32,
    /// Validity proof and public inputs.
    pub rollup_proof_data: Vec<u8>,
    /// Encrypted per-note viewing material.
    pub viewing_keys_data: Vec<u8>,
    /// Interaction outcomes, in interaction nonce order.
    pub interaction_result: Vec<DefiInteractionNote>,
    pub gas_used: u64,
    pub gas_price: u128,
}

impl Display for Block {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ rollup_id: {}, tx_hash: {}, rollup_size: {}, interactions: {} }}",
            self.rollup_id,
            self.tx_hash,
            self.rollup_size,
            self.interaction_result.len()
        )
    }
}

/// A block which has not yet been assigned its position in the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingBlock {
    pub tx_hash: TxHash,
    pub rollup_size: u32,
    pub rollup_proof_data: Vec<u8>,
    pub viewing_keys_data: Vec<u8>,
    pub interaction_result: Vec<DefiInteractionNote>,
    pub gas_used: u64,
    pub gas_price: u128,
}

impl PendingBlock {
    pub fn into_block(self, rollup_id: RollupId, created: SystemTime) -> Block {
        Block {
            tx_hash: self.tx_hash,
            created,
            rollup_id,
            rollup_size: self.rollup_size,
            rollup_proof_data: self.rollup_proof_data,
            viewing_keys_data: self.viewing_keys_data,
            interaction_result: self.interaction_result,
            gas_used: self.gas_used,
            gas_price: self.gas_price,
        }
    }
}
