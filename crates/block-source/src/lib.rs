//! Ordered, gap-free delivery of rollup blocks.
//!
//! A [`BlockSource`] first backfills every historical block from a requested rollup id and then
//! streams newly produced blocks to its registered listeners. The blocks themselves come from a
//! [`BlockProducer`], an external collaborator which only needs to support range fetches and
//! ordered live notifications.
//!
//! Terminology:
//! - Tip: the highest rollup id known to exist.
//! - High-water-mark: the highest rollup id already delivered to listeners by a source.

#[cfg(test)]
pub mod test_utils;

pub mod block;
pub mod config;
pub mod errors;
pub mod producer;
pub mod source;

pub use block::{Block, DefiInteractionNote, PendingBlock, RollupId, TxHash};
pub use config::{BlockSourceConfig, LocalProducerConfig};
pub use errors::{BlockSourceError, ProducerError};
pub use producer::{local::LocalBlockProducer, BlockProducer, BlockStream};
pub use source::{
    streaming::StreamingBlockSource, BlockListener, BlockSource, ErrorListener, ListenerId,
    SourcePhase,
};

// CONSTANTS
// =================================================================================================

/// The name of the block source component, used as the tracing target.
pub const COMPONENT: &str = "rollup-sync-block-source";
