use std::{
    collections::BTreeSet,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::SystemTime,
};

use async_trait::async_trait;
use futures::StreamExt;

use crate::{
    block::{Block, DefiInteractionNote, PendingBlock, RollupId, TxHash},
    config::LocalProducerConfig,
    errors::ProducerError,
    producer::{local::LocalBlockProducer, BlockProducer, BlockStream},
};

// BLOCKS
// =================================================================================================

/// Returns a pending block whose contents are derived from `seed`.
pub fn pending_block(seed: u32) -> PendingBlock {
    let mut tx_hash = [0u8; 32];
    tx_hash[..4].copy_from_slice(&seed.to_be_bytes());

    PendingBlock {
        tx_hash: TxHash::new(tx_hash),
        rollup_size: 28,
        rollup_proof_data: seed.to_le_bytes().to_vec(),
        viewing_keys_data: vec![0xee; 8],
        interaction_result: vec![DefiInteractionNote {
            bridge_id: u64::from(seed),
            nonce: seed * 4,
            total_input_value: 100,
            total_output_value_a: 99,
            total_output_value_b: 0,
            result: true,
        }],
        gas_used: 21_000,
        gas_price: 50,
    }
}

pub fn block_at(rollup_id: u32) -> Block {
    pending_block(rollup_id).into_block(RollupId::new(rollup_id), SystemTime::UNIX_EPOCH)
}

pub fn rollup_ids<'a>(blocks: impl IntoIterator<Item = &'a Block>) -> Vec<u32> {
    blocks.into_iter().map(|block| block.rollup_id.as_u32()).collect()
}

// MOCK PRODUCER
// =================================================================================================

/// A [`LocalBlockProducer`] with injectable faults.
#[derive(Debug)]
pub struct MockProducer {
    chain: Arc<LocalBlockProducer>,
    /// Number of upcoming requests which fail with [`ProducerError::Unavailable`].
    failures: AtomicU32,
    /// Requests never complete while set.
    stalled: AtomicBool,
    /// Rollup ids which are withheld from live subscribers.
    withheld: Arc<Mutex<BTreeSet<RollupId>>>,
    /// Rollup ids which are left out of fetched pages.
    omitted: Mutex<BTreeSet<RollupId>>,
    /// Fetches return no blocks while set.
    empty_pages: AtomicBool,
    fetch_calls: AtomicU32,
}

impl MockProducer {
    pub fn new(config: &LocalProducerConfig) -> Self {
        Self {
            chain: Arc::new(LocalBlockProducer::new(config)),
            failures: AtomicU32::new(0),
            stalled: AtomicBool::new(false),
            withheld: Arc::default(),
            omitted: Mutex::default(),
            empty_pages: AtomicBool::new(false),
            fetch_calls: AtomicU32::new(0),
        }
    }

    /// Produces `count` blocks and returns the rollup id of the last one.
    pub fn produce(&self, count: u32) -> Option<RollupId> {
        for _ in 0..count {
            let seed = self.chain.tip().map_or(0, |tip| tip.as_u32() + 1);
            self.chain.produce_block(pending_block(seed)).unwrap();
        }
        self.chain.tip()
    }

    pub fn fail_next_requests(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub fn withhold_from_live(&self, rollup_id: u32) {
        self.withheld.lock().unwrap().insert(RollupId::new(rollup_id));
    }

    pub fn omit_from_pages(&self, rollup_id: u32) {
        self.omitted.lock().unwrap().insert(RollupId::new(rollup_id));
    }

    pub fn set_empty_pages(&self, empty: bool) {
        self.empty_pages.store(empty, Ordering::SeqCst);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn check_faults(&self) -> Result<(), ProducerError> {
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProducerError::Unavailable("injected failure".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl BlockProducer for MockProducer {
    async fn fetch_blocks(&self, from: RollupId) -> Result<Vec<Block>, ProducerError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_faults().await?;
        if self.empty_pages.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let mut page = self.chain.fetch_blocks(from).await?;
        page.retain(|block| !self.omitted.lock().unwrap().contains(&block.rollup_id));
        Ok(page)
    }

    async fn latest_rollup_id(&self) -> Result<Option<RollupId>, ProducerError> {
        self.check_faults().await?;
        self.chain.latest_rollup_id().await
    }

    async fn subscribe(&self) -> Result<BlockStream, ProducerError> {
        self.check_faults().await?;

        let withheld = Arc::clone(&self.withheld);
        let stream = self.chain.subscribe().await?.filter(move |notification| {
            let keep = match notification {
                Ok(block) => !withheld.lock().unwrap().contains(&block.rollup_id),
                Err(_) => true,
            };
            std::future::ready(keep)
        });

        Ok(stream.boxed())
    }
}

// FIXED PRODUCER
// =================================================================================================

/// A producer serving a fixed set of blocks at arbitrary rollup ids, without live notifications.
#[derive(Debug)]
pub struct FixedProducer {
    blocks: Vec<Block>,
}

impl FixedProducer {
    /// Serves one block per id. `ids` have to be increasing.
    pub fn new(ids: impl IntoIterator<Item = u32>) -> Self {
        Self { blocks: ids.into_iter().map(block_at).collect() }
    }
}

#[async_trait]
impl BlockProducer for FixedProducer {
    async fn fetch_blocks(&self, from: RollupId) -> Result<Vec<Block>, ProducerError> {
        Ok(self.blocks.iter().filter(|block| block.rollup_id >= from).cloned().collect())
    }

    async fn latest_rollup_id(&self) -> Result<Option<RollupId>, ProducerError> {
        Ok(self.blocks.last().map(|block| block.rollup_id))
    }

    async fn subscribe(&self) -> Result<BlockStream, ProducerError> {
        Ok(futures::stream::pending().boxed())
    }
}
