use std::{
    cmp::Ordering as IdOrdering,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, MutexGuard, PoisonError,
    },
};

use async_trait::async_trait;
use futures::StreamExt;
use rollup_sync_utils::formatting::format_opt;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, instrument, warn};

use super::{
    listeners::ListenerRegistry,
    retry::{RetryPolicy, Shutdown},
    BlockListener, BlockSource, ErrorListener, ListenerId, SourcePhase,
};
use crate::{
    block::{Block, RollupId},
    config::BlockSourceConfig,
    errors::{BlockSourceError, ProducerError},
    producer::{BlockProducer, BlockStream},
    COMPONENT,
};

// PHASE
// =================================================================================================

enum Phase {
    Idle,
    Starting {
        session: u64,
        shutdown: watch::Sender<bool>,
    },
    Streaming {
        shutdown: watch::Sender<bool>,
        live: JoinHandle<Result<(), BlockSourceError>>,
    },
    Stopped,
}

impl Phase {
    fn source_phase(&self) -> SourcePhase {
        match self {
            Self::Idle => SourcePhase::Idle,
            Self::Starting { .. } => SourcePhase::Starting,
            // The live task ends by itself only after an unrecoverable error.
            Self::Streaming { live, .. } if live.is_finished() => SourcePhase::Stopped,
            Self::Streaming { .. } => SourcePhase::Streaming,
            Self::Stopped => SourcePhase::Stopped,
        }
    }
}

/// A single `start`/`stop` cycle.
#[derive(Clone, Debug)]
struct Session {
    id: u64,
    /// Lowest rollup id the caller asked for.
    floor: RollupId,
    shutdown: Shutdown,
}

impl Session {
    /// Returns the rollup id which has to be delivered next, or `None` once [`RollupId::MAX`]
    /// has been delivered.
    fn expected(&self, high_water_mark: Option<RollupId>) -> Option<RollupId> {
        match high_water_mark {
            Some(delivered) => delivered.child().map(|next| next.max(self.floor)),
            None => Some(self.floor),
        }
    }
}

/// Outcome of offering a block for delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Delivered,
    /// Already delivered, or below the session's floor.
    Skipped,
    /// Blocks between the high-water-mark and the offered block are missing.
    Gap { expected: RollupId },
}

// STREAMING BLOCK SOURCE
// =================================================================================================

/// A [`BlockSource`] which merges a backfill from a [`BlockProducer`]'s history with its live
/// notifications.
///
/// The merge is driven by the source's high-water-mark rather than by notification timing:
/// - the live subscription is opened before the tip is read, so no block produced during the
///   backfill is missed,
/// - live blocks at or below the high-water-mark are dropped as duplicates,
/// - a live block beyond the next expected id triggers a backfill of the missing range before it
///   is delivered.
///
/// The high-water-mark survives `stop`/`start` cycles, so no block is ever delivered twice by the
/// same instance. Restarting below it resumes right after it.
///
/// [`get_blocks`](BlockSource::get_blocks) reads the producer directly. It never delivers to
/// listeners nor touches the high-water-mark, so it may run concurrently with live delivery.
pub struct StreamingBlockSource<P> {
    inner: Arc<Inner<P>>,
}

struct Inner<P> {
    producer: P,
    retry: RetryPolicy,
    listeners: ListenerRegistry,
    /// Highest rollup id delivered to listeners. Held for the duration of a delivery.
    high_water_mark: Mutex<Option<RollupId>>,
    /// Highest rollup id known to exist, plus one. Zero while no block is known.
    known_tip: AtomicU64,
    phase: std::sync::Mutex<Phase>,
    next_session: AtomicU64,
}

impl<P: BlockProducer> StreamingBlockSource<P> {
    pub fn new(producer: P, config: &BlockSourceConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                producer,
                retry: RetryPolicy::from(config),
                listeners: ListenerRegistry::default(),
                high_water_mark: Mutex::new(None),
                known_tip: AtomicU64::new(0),
                phase: std::sync::Mutex::new(Phase::Idle),
                next_session: AtomicU64::new(0),
            }),
        }
    }

    pub fn phase(&self) -> SourcePhase {
        self.inner.lock_phase().source_phase()
    }

    /// Returns the highest rollup id delivered to listeners so far.
    pub async fn high_water_mark(&self) -> Option<RollupId> {
        *self.inner.high_water_mark.lock().await
    }

    fn begin_session(&self, from_block: Option<RollupId>) -> Result<Session, BlockSourceError> {
        let mut phase = self.inner.lock_phase();
        if matches!(phase.source_phase(), SourcePhase::Starting | SourcePhase::Streaming) {
            return Err(BlockSourceError::AlreadyStarted);
        }

        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        let (shutdown, receiver) = watch::channel(false);
        *phase = Phase::Starting { session: id, shutdown };

        Ok(Session {
            id,
            floor: from_block.unwrap_or(RollupId::GENESIS),
            shutdown: Shutdown::new(receiver),
        })
    }

    /// Hands a backfilled session over to the live task, unless it was stopped in the meantime.
    fn begin_streaming(
        &self,
        session: Session,
        stream: BlockStream,
    ) -> Result<(), BlockSourceError> {
        let mut phase = self.inner.lock_phase();

        match std::mem::replace(&mut *phase, Phase::Stopped) {
            Phase::Starting { session: id, shutdown } if id == session.id => {
                let live = tokio::spawn(Arc::clone(&self.inner).stream_live(stream, session));
                *phase = Phase::Streaming { shutdown, live };
                Ok(())
            },
            other => {
                *phase = other;
                Err(BlockSourceError::Cancelled)
            },
        }
    }

    fn abandon_session(&self, session: &Session) {
        let mut phase = self.inner.lock_phase();
        if matches!(*phase, Phase::Starting { session: id, .. } if id == session.id) {
            *phase = Phase::Stopped;
        }
    }
}

#[async_trait]
impl<P: BlockProducer> BlockSource for StreamingBlockSource<P> {
    #[instrument(
        target = COMPONENT,
        name = "block_source:get_blocks",
        skip_all,
        fields(from = %from),
        err
    )]
    async fn get_blocks(&self, from: RollupId) -> Result<Vec<Block>, BlockSourceError> {
        self.inner.get_blocks(from).await
    }

    #[instrument(
        target = COMPONENT,
        name = "block_source:start",
        skip_all,
        fields(from_block = %format_opt(from_block.as_ref())),
        err
    )]
    async fn start(&self, from_block: Option<RollupId>) -> Result<(), BlockSourceError> {
        let session = self.begin_session(from_block)?;

        info!(
            target: COMPONENT,
            floor = %session.floor,
            listeners = self.inner.listeners.count(),
            "backfilling historical blocks",
        );

        match self.inner.backfill(&session).await {
            Ok(stream) => {
                let high_water_mark = self.high_water_mark().await;
                info!(
                    target: COMPONENT,
                    high_water_mark = %format_opt(high_water_mark.as_ref()),
                    tip = %format_opt(self.inner.known_tip().as_ref()),
                    "backfill complete, streaming live blocks",
                );
                self.begin_streaming(session, stream)
            },
            Err(err) => {
                self.abandon_session(&session);
                Err(err)
            },
        }
    }

    #[instrument(target = COMPONENT, name = "block_source:stop", skip_all, err)]
    async fn stop(&self) -> Result<(), BlockSourceError> {
        let previous = {
            let mut phase = self.inner.lock_phase();
            if matches!(*phase, Phase::Idle) {
                return Ok(());
            }
            std::mem::replace(&mut *phase, Phase::Stopped)
        };

        let result = match previous {
            Phase::Idle | Phase::Stopped => Ok(()),
            Phase::Starting { shutdown, .. } => {
                let _ = shutdown.send(true);
                Ok(())
            },
            Phase::Streaming { shutdown, live } => {
                let _ = shutdown.send(true);
                live.await.map_err(BlockSourceError::LiveTaskFailed).and_then(|result| result)
            },
        };

        // Waits out a delivery which was already in progress when the shutdown was signalled.
        // Later deliveries observe the signal and are dropped.
        drop(self.inner.high_water_mark.lock().await);

        info!(target: COMPONENT, "block source stopped");

        result
    }

    fn on_block(&self, listener: BlockListener) -> ListenerId {
        self.inner.listeners.add_block_listener(listener)
    }

    fn on_error(&self, listener: ErrorListener) -> ListenerId {
        self.inner.listeners.add_error_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    fn remove_all_listeners(&self) {
        self.inner.listeners.clear();
    }

    fn latest_rollup_id(&self) -> Option<RollupId> {
        self.inner.known_tip()
    }
}

// INNER
// =================================================================================================

impl<P: BlockProducer> Inner<P> {
    fn lock_phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observe_tip(&self, rollup_id: RollupId) {
        self.known_tip.fetch_max(u64::from(rollup_id.as_u32()) + 1, Ordering::AcqRel);
    }

    fn known_tip(&self) -> Option<RollupId> {
        self.known_tip
            .load(Ordering::Acquire)
            .checked_sub(1)
            .and_then(|tip| u32::try_from(tip).ok())
            .map(RollupId::new)
    }

    // PRODUCER REQUESTS
    // --------------------------------------------------------------------------------------------

    async fn producer_tip(
        &self,
        shutdown: &Shutdown,
    ) -> Result<Option<RollupId>, BlockSourceError> {
        let producer = &self.producer;
        let tip = self
            .retry
            .run(shutdown, "latest_rollup_id", move || producer.latest_rollup_id())
            .await?;

        if let Some(tip) = tip {
            self.observe_tip(tip);
        }

        Ok(tip)
    }

    /// Fetches a non-empty, contiguous page of blocks starting exactly at `from`.
    async fn fetch_page(
        &self,
        shutdown: &Shutdown,
        from: RollupId,
        tip: RollupId,
    ) -> Result<Vec<Block>, BlockSourceError> {
        let producer = &self.producer;
        let page = self
            .retry
            .run(shutdown, "fetch_blocks", move || async move {
                validate_page(from, tip, producer.fetch_blocks(from).await?)
            })
            .await?;

        if let Some(last) = page.last() {
            self.observe_tip(last.rollup_id);
        }

        Ok(page)
    }

    async fn subscribe(&self, shutdown: &Shutdown) -> Result<BlockStream, BlockSourceError> {
        let producer = &self.producer;
        self.retry.run(shutdown, "subscribe", move || producer.subscribe()).await
    }

    async fn get_blocks(&self, from: RollupId) -> Result<Vec<Block>, BlockSourceError> {
        let shutdown = Shutdown::never();
        let Some(tip) = self.producer_tip(&shutdown).await? else {
            return Ok(Vec::new());
        };

        let mut blocks = Vec::new();
        let mut cursor = Some(from);
        while let Some(next) = cursor.filter(|next| *next <= tip) {
            let page = self.fetch_page(&shutdown, next, tip).await?;
            let Some(last) = page.last() else { break };
            cursor = last.rollup_id.child();
            blocks.extend(page);
        }

        debug!(target: COMPONENT, %from, %tip, blocks = blocks.len(), "blocks fetched");

        Ok(blocks)
    }

    // DELIVERY
    // --------------------------------------------------------------------------------------------

    /// Offers a block to the listeners.
    ///
    /// Only the block directly following the high-water-mark is delivered. The high-water-mark
    /// lock is held while listeners run, so deliveries never interleave.
    async fn deliver(
        &self,
        session: &Session,
        block: &Arc<Block>,
    ) -> Result<Delivery, BlockSourceError> {
        let mut high_water_mark = self.high_water_mark.lock().await;
        if session.shutdown.is_triggered() {
            return Err(BlockSourceError::Cancelled);
        }

        let Some(expected) = session.expected(*high_water_mark) else {
            return Ok(Delivery::Skipped);
        };

        match block.rollup_id.cmp(&expected) {
            IdOrdering::Less => Ok(Delivery::Skipped),
            IdOrdering::Greater => Ok(Delivery::Gap { expected }),
            IdOrdering::Equal => {
                *high_water_mark = Some(block.rollup_id);
                self.listeners.notify_block(block);
                debug!(target: COMPONENT, rollup_id = %block.rollup_id, "block delivered");
                Ok(Delivery::Delivered)
            },
        }
    }

    /// Delivers every block from the next expected id up to and including `target`.
    async fn fill_to(&self, session: &Session, target: RollupId) -> Result<(), BlockSourceError> {
        loop {
            let high_water_mark = *self.high_water_mark.lock().await;
            let Some(expected) = session.expected(high_water_mark).filter(|next| *next <= target)
            else {
                return Ok(());
            };

            for block in self.fetch_page(&session.shutdown, expected, target).await? {
                let delivery = self.deliver(session, &Arc::new(block)).await?;
                // Pages start at the expected id and are validated to be contiguous.
                debug_assert!(!matches!(delivery, Delivery::Gap { .. }), "gap within a page");
            }
        }
    }

    /// Delivers everything up to the producer's current tip.
    async fn catch_up(&self, session: &Session) -> Result<(), BlockSourceError> {
        match self.producer_tip(&session.shutdown).await? {
            Some(tip) => self.fill_to(session, tip).await,
            None => Ok(()),
        }
    }

    /// Opens a live subscription and delivers all history up to the current tip.
    ///
    /// The subscription is opened first so blocks produced while catching up are buffered in it;
    /// the ones which were also part of the backfill are skipped by the live phase.
    async fn backfill(&self, session: &Session) -> Result<BlockStream, BlockSourceError> {
        let stream = self.subscribe(&session.shutdown).await?;
        self.catch_up(session).await?;
        Ok(stream)
    }

    // LIVE PHASE
    // --------------------------------------------------------------------------------------------

    async fn stream_live(
        self: Arc<Self>,
        stream: BlockStream,
        session: Session,
    ) -> Result<(), BlockSourceError> {
        match self.run_live(stream, &session).await {
            Ok(()) | Err(BlockSourceError::Cancelled) => {
                debug!(target: COMPONENT, session = session.id, "live delivery finished");
                Ok(())
            },
            Err(err) => {
                error!(
                    target: COMPONENT,
                    session = session.id,
                    error = %err,
                    "live delivery failed",
                );
                self.listeners.notify_error(&err);
                Err(err)
            },
        }
    }

    async fn run_live(
        &self,
        mut stream: BlockStream,
        session: &Session,
    ) -> Result<(), BlockSourceError> {
        let mut failures = 0;

        loop {
            let notification = tokio::select! {
                biased;
                () = session.shutdown.triggered() => return Ok(()),
                notification = stream.next() => notification,
            };

            let err = match notification {
                Some(Ok(block)) => {
                    failures = 0;
                    self.observe_tip(block.rollup_id);
                    self.accept_live(session, Arc::new(block)).await?;
                    continue;
                },
                Some(Err(err)) => err,
                None => ProducerError::StreamClosed,
            };

            failures += 1;
            if failures > self.retry.max_retries() {
                return Err(BlockSourceError::TransportFailure { attempts: failures, source: err });
            }

            warn!(
                target: COMPONENT,
                error = %err,
                failures,
                "live subscription interrupted, resubscribing",
            );

            self.retry.pause(&session.shutdown, failures).await?;
            stream = self.backfill(session).await?;
        }
    }

    async fn accept_live(
        &self,
        session: &Session,
        block: Arc<Block>,
    ) -> Result<(), BlockSourceError> {
        let Delivery::Gap { expected } = self.deliver(session, &block).await? else {
            return Ok(());
        };

        let gap = BlockSourceError::GapDetected { expected, observed: block.rollup_id };
        warn!(target: COMPONENT, error = %gap, "recovering missing blocks from the producer");

        // A gap means the observed id is above the expected one, so it has a parent.
        if let Some(last_missing) = block.rollup_id.parent() {
            self.fill_to(session, last_missing).await?;
        }

        self.deliver(session, &block).await.map(|_| ())
    }
}

/// Checks that `blocks` continues the chain from `from` one rollup at a time, and is not empty
/// while `from` is at or below the producer's `tip`.
fn validate_page(
    from: RollupId,
    tip: RollupId,
    blocks: Vec<Block>,
) -> Result<Vec<Block>, ProducerError> {
    if blocks.is_empty() && from <= tip {
        return Err(ProducerError::MissingBlocks { from, tip });
    }

    let mut expected = Some(from);
    for block in &blocks {
        match expected {
            Some(id) if id == block.rollup_id => expected = id.child(),
            Some(id) => {
                return Err(ProducerError::NonContiguous { expected: id, actual: block.rollup_id });
            },
            None => return Err(ProducerError::BeyondLastRollup { actual: block.rollup_id }),
        }
    }

    Ok(blocks)
}
