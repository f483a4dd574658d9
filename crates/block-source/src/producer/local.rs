use std::{
    sync::{PoisonError, RwLock},
    time::SystemTime,
};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::debug;

use super::{BlockProducer, BlockStream};
use crate::{
    block::{Block, PendingBlock, RollupId},
    config::LocalProducerConfig,
    errors::ProducerError,
    COMPONENT,
};

// LOCAL BLOCK PRODUCER
// =================================================================================================

/// An in-process block producer.
///
/// Keeps the full chain in memory and notifies live subscribers through a broadcast channel.
/// Subscribers which fall more than `live_capacity` blocks behind receive
/// [`ProducerError::Lagged`] and are expected to recover from the chain history.
#[derive(Debug)]
pub struct LocalBlockProducer {
    chain: RwLock<Vec<Block>>,
    live: broadcast::Sender<Block>,
    page_size: usize,
}

impl LocalBlockProducer {
    pub fn new(config: &LocalProducerConfig) -> Self {
        let (live, _) = broadcast::channel(config.live_capacity.max(1));

        Self {
            chain: RwLock::default(),
            live,
            page_size: config.page_size.max(1),
        }
    }

    /// Appends a block to the chain, assigning it the next rollup id, and notifies live
    /// subscribers.
    ///
    /// Fails with [`ProducerError::RollupIdsExhausted`] once a block at [`RollupId::MAX`] exists.
    pub fn produce_block(&self, pending: PendingBlock) -> Result<Block, ProducerError> {
        let mut chain = self.chain.write().unwrap_or_else(PoisonError::into_inner);

        let rollup_id = next_rollup_id(chain.len()).ok_or(ProducerError::RollupIdsExhausted)?;
        let block = pending.into_block(rollup_id, SystemTime::now());
        chain.push(block.clone());

        // The chain lock is still held so notifications go out in chain order. A send error only
        // means there are no live subscribers at the moment.
        let _ = self.live.send(block.clone());

        debug!(target: COMPONENT, %block, "block produced");

        Ok(block)
    }

    /// Returns the highest rollup id produced so far.
    pub fn tip(&self) -> Option<RollupId> {
        let chain = self.chain.read().unwrap_or_else(PoisonError::into_inner);
        chain.last().map(|block| block.rollup_id)
    }
}

/// Returns the rollup id of the block appended to a chain of `len` blocks.
fn next_rollup_id(len: usize) -> Option<RollupId> {
    u32::try_from(len).ok().map(RollupId::new)
}

#[async_trait]
impl BlockProducer for LocalBlockProducer {
    async fn fetch_blocks(&self, from: RollupId) -> Result<Vec<Block>, ProducerError> {
        let chain = self.chain.read().unwrap_or_else(PoisonError::into_inner);

        Ok(chain
            .iter()
            .skip(from.as_u32() as usize)
            .take(self.page_size)
            .cloned()
            .collect())
    }

    async fn latest_rollup_id(&self) -> Result<Option<RollupId>, ProducerError> {
        Ok(self.tip())
    }

    async fn subscribe(&self) -> Result<BlockStream, ProducerError> {
        let stream = BroadcastStream::new(self.live.subscribe()).map(|notification| {
            notification.map_err(|BroadcastStreamRecvError::Lagged(skipped)| {
                ProducerError::Lagged(skipped)
            })
        });

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    use super::{next_rollup_id, LocalBlockProducer};
    use crate::{
        config::LocalProducerConfig, errors::ProducerError, producer::BlockProducer,
        test_utils::pending_block, RollupId,
    };

    fn ids(blocks: &[crate::Block]) -> Vec<u32> {
        blocks.iter().map(|block| block.rollup_id.as_u32()).collect()
    }

    #[tokio::test]
    async fn fetches_are_paged_from_the_requested_id() {
        let producer =
            LocalBlockProducer::new(&LocalProducerConfig { page_size: 2, ..Default::default() });
        assert_eq!(producer.latest_rollup_id().await.unwrap(), None);

        for seed in 0..5 {
            producer.produce_block(pending_block(seed)).unwrap();
        }

        assert_eq!(producer.latest_rollup_id().await.unwrap(), Some(RollupId::new(4)));
        assert_eq!(ids(&producer.fetch_blocks(RollupId::new(1)).await.unwrap()), vec![1, 2]);
        assert_eq!(ids(&producer.fetch_blocks(RollupId::new(4)).await.unwrap()), vec![4]);
        assert!(producer.fetch_blocks(RollupId::new(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscribers_only_see_blocks_produced_after_subscribing() {
        let producer = LocalBlockProducer::new(&LocalProducerConfig::default());
        producer.produce_block(pending_block(0)).unwrap();

        let mut live = producer.subscribe().await.unwrap();
        producer.produce_block(pending_block(1)).unwrap();

        let block = live.next().await.unwrap().unwrap();
        assert_eq!(block.rollup_id, RollupId::new(1));
    }

    #[tokio::test]
    async fn slow_subscribers_are_told_they_lagged() {
        let producer = LocalBlockProducer::new(&LocalProducerConfig {
            live_capacity: 1,
            ..Default::default()
        });

        let mut live = producer.subscribe().await.unwrap();
        for seed in 0..3 {
            producer.produce_block(pending_block(seed)).unwrap();
        }

        assert!(matches!(live.next().await, Some(Err(ProducerError::Lagged(2)))));
        assert_eq!(live.next().await.unwrap().unwrap().rollup_id, RollupId::new(2));
    }

    #[test]
    fn rollup_ids_run_out_after_the_last_representable_one() {
        assert_eq!(next_rollup_id(0), Some(RollupId::GENESIS));
        assert_eq!(next_rollup_id(u32::MAX as usize), Some(RollupId::MAX));
        assert_eq!(next_rollup_id(u32::MAX as usize + 1), None);
    }
}
