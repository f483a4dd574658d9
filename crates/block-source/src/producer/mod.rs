use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
    block::{Block, RollupId},
    errors::ProducerError,
};

pub mod local;

/// Live notifications of newly produced blocks, in increasing rollup id order.
pub type BlockStream = BoxStream<'static, Result<Block, ProducerError>>;

// BLOCK PRODUCER
// =================================================================================================

/// The external system which produces rollup blocks.
///
/// Implementations wrap whatever transport reaches the producer. A
/// [`BlockSource`](crate::BlockSource) relies on two properties only: range fetches by starting
/// rollup id, and ordered notification of newly produced blocks.
#[async_trait]
pub trait BlockProducer: Send + Sync + 'static {
    /// Returns blocks with a rollup id of at least `from`, in increasing order.
    ///
    /// The response may be a bounded page which ends before the producer's tip.
    async fn fetch_blocks(&self, from: RollupId) -> Result<Vec<Block>, ProducerError>;

    /// Returns the highest rollup id produced so far, or `None` before the first block.
    async fn latest_rollup_id(&self) -> Result<Option<RollupId>, ProducerError>;

    /// Subscribes to blocks produced from now on.
    async fn subscribe(&self) -> Result<BlockStream, ProducerError>;
}

#[async_trait]
impl<T: BlockProducer + ?Sized> BlockProducer for Arc<T> {
    async fn fetch_blocks(&self, from: RollupId) -> Result<Vec<Block>, ProducerError> {
        (**self).fetch_blocks(from).await
    }

    async fn latest_rollup_id(&self) -> Result<Option<RollupId>, ProducerError> {
        (**self).latest_rollup_id().await
    }

    async fn subscribe(&self) -> Result<BlockStream, ProducerError> {
        (**self).subscribe().await
    }
}
