use thiserror::Error;
use tokio::task::JoinError;

use crate::block::RollupId;

// Producer errors
// =================================================================================================

/// Errors reported by a [`BlockProducer`](crate::BlockProducer), or detected while validating its
/// responses.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("block producer is unavailable: {0}")]
    Unavailable(String),

    /// A fetched page did not continue the requested range one rollup at a time.
    #[error("block producer returned rollup {actual} where rollup {expected} was expected")]
    NonContiguous { expected: RollupId, actual: RollupId },

    /// A fetched page continued past [`RollupId::MAX`].
    #[error("block producer returned rollup {actual} after the last representable rollup")]
    BeyondLastRollup { actual: RollupId },

    /// The producer reported a tip but returned no blocks up to it.
    #[error("block producer returned no blocks from rollup {from} although its tip is {tip}")]
    MissingBlocks { from: RollupId, tip: RollupId },

    /// The live subscription fell behind and the producer discarded notifications.
    #[error("live subscription lagged behind by {0} blocks")]
    Lagged(u64),

    #[error("live subscription was closed by the block producer")]
    StreamClosed,

    /// The chain already holds a block at [`RollupId::MAX`].
    #[error("block producer cannot assign a rollup id after {}", RollupId::MAX)]
    RollupIdsExhausted,
}

// Block source errors
// =================================================================================================

#[derive(Debug, Error)]
pub enum BlockSourceError {
    /// The block producer could not be reached, or kept returning malformed data, until the
    /// retry budget was exhausted.
    #[error("block producer failed after {attempts} attempts")]
    TransportFailure {
        attempts: u32,
        #[source]
        source: ProducerError,
    },

    /// The live phase observed a rollup beyond the next expected one.
    ///
    /// This is recovered by backfilling the missing range before resuming live delivery.
    #[error("live stream skipped from rollup {expected} to rollup {observed}")]
    GapDetected { expected: RollupId, observed: RollupId },

    #[error("block source is already started")]
    AlreadyStarted,

    /// The source was stopped before the operation completed.
    #[error("block source was stopped before the operation completed")]
    Cancelled,

    #[error("live delivery task panic'd")]
    LiveTaskFailed(#[source] JoinError),
}
