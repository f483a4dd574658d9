use std::{future::Future, io, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use rollup_sync_block_source::{
    Block, BlockSource, BlockSourceError, LocalBlockProducer, RollupId, StreamingBlockSource,
};
use rollup_sync_identity::{UserData, UserDataFactory};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use super::{private_key_or_random, simulated_block};
use crate::{config::ClientConfig, COMPONENT};

/// Follows a locally produced chain, advancing a single account's sync horizon with every block.
///
/// Runs until `blocks` blocks were received, the source fails, or the process is interrupted.
pub async fn follow(
    config: ClientConfig,
    private_key: Option<&str>,
    from: Option<RollupId>,
    blocks: Option<u64>,
) -> anyhow::Result<()> {
    info!(target: COMPONENT, %config, "starting client");

    let (private_key, _) = private_key_or_random(private_key)?;
    let user = UserDataFactory::new()
        .create_user(private_key, 0, None, from.and_then(RollupId::parent))
        .context("failed to create account")?;

    let Some(resume_from) = user.resume_from() else {
        info!(target: COMPONENT, %user, "account is synced to the last rollup");
        return Ok(());
    };

    let producer = Arc::new(LocalBlockProducer::new(&config.producer));
    for _ in 0..config.simulation.genesis_blocks {
        producer
            .produce_block(simulated_block())
            .context("failed to produce genesis blocks")?;
    }

    let source = StreamingBlockSource::new(Arc::clone(&producer), &config.block_source);
    let (_, mut received) = source.subscribe();

    let (error_sender, mut errors) = mpsc::unbounded_channel();
    source.on_error(Box::new(move |err: &BlockSourceError| {
        let _ = error_sender.send(err.to_string());
    }));

    source
        .start(Some(resume_from))
        .await
        .context("failed to start block source")?;

    let producing = tokio::spawn(produce_blocks(producer, config.simulation.block_interval()));

    let mut progress = Progress { user, blocks: 0 };
    let outcome = progress
        .receive(&mut received, &mut errors, blocks, tokio::signal::ctrl_c())
        .await;

    producing.abort();
    let stopped = source.stop().await;

    info!(target: COMPONENT, user = %progress.user, blocks = progress.blocks, "client stopped");

    outcome?;
    stopped.context("failed to stop block source")
}

/// Produces a block every `interval` until aborted.
async fn produce_blocks(producer: Arc<LocalBlockProducer>, interval: Duration) {
    let mut interval = tokio::time::interval(interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        if let Err(err) = producer.produce_block(simulated_block()) {
            warn!(target: COMPONENT, error = %err, "block production stopped");
            return;
        }
    }
}

// PROGRESS
// =================================================================================================

/// The followed account, and the number of blocks received for it.
struct Progress {
    user: UserData,
    blocks: u64,
}

impl Progress {
    /// Advances the account with every received block.
    ///
    /// Returns once `limit` blocks were received, the block source reported a failure, or
    /// `interrupted` completed. The account keeps the last horizon it was advanced to.
    async fn receive(
        &mut self,
        received: &mut UnboundedReceiver<Arc<Block>>,
        errors: &mut UnboundedReceiver<String>,
        limit: Option<u64>,
        interrupted: impl Future<Output = io::Result<()>>,
    ) -> anyhow::Result<()> {
        tokio::pin!(interrupted);

        loop {
            if limit.is_some_and(|limit| self.blocks >= limit) {
                return Ok(());
            }

            tokio::select! {
                block = received.recv() => {
                    let Some(block) = block else {
                        return Ok(());
                    };

                    self.user
                        .sync_to_rollup(block.rollup_id)
                        .context("failed to advance account")?;
                    self.blocks += 1;
                    info!(target: COMPONENT, %block, "block received");
                },
                Some(err) = errors.recv() => bail!("block source failed: {err}"),
                signal = &mut interrupted => {
                    signal.context("failed to listen for interrupts")?;
                    warn!(target: COMPONENT, "interrupted");
                    return Ok(());
                },
            }
        }
    }
}
