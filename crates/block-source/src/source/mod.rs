use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    block::{Block, RollupId},
    errors::BlockSourceError,
};

mod listeners;
mod retry;
pub mod streaming;


/// Callback invoked for every block delivered while it is registered.
pub type BlockListener = Box<dyn Fn(Arc<Block>) + Send + Sync + 'static>;

/// Callback invoked when live delivery stops because of an unrecoverable error.
pub type ErrorListener = Box<dyn Fn(&BlockSourceError) + Send + Sync + 'static>;

/// Handle to a registered listener, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Lifecycle phase of a block source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePhase {
    /// Never started.
    Idle,
    /// Backfilling historical blocks.
    Starting,
    /// Delivering newly produced blocks.
    Streaming,
    /// Stopped by the caller, or by an unrecoverable error.
    Stopped,
}

impl Display for SourcePhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let phase = match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
        };
        f.write_str(phase)
    }
}

// BLOCK SOURCE
// =================================================================================================

/// Delivers a total, gap-free and order preserving view of the rollup chain.
///
/// For any two blocks delivered by the same source, the one delivered first has the lower rollup
/// id. Within one `start`/`stop` cycle delivered ids are contiguous from the requested start.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Returns every currently known block with a rollup id of at least `from`, in increasing
    /// order and without gaps.
    ///
    /// This is a point-in-time read: it does not notify listeners and returns an empty vector if
    /// `from` is beyond the tip.
    async fn get_blocks(&self, from: RollupId) -> Result<Vec<Block>, BlockSourceError>;

    /// Starts delivering blocks to the registered listeners.
    ///
    /// Every historical block from `from_block` (genesis if `None`) up to the current tip has been
    /// delivered by the time this returns. Newly produced blocks are delivered afterwards, until
    /// [`stop`](Self::stop) is called.
    ///
    /// Returns [`BlockSourceError::AlreadyStarted`] if the source is already starting or
    /// streaming.
    async fn start(&self, from_block: Option<RollupId>) -> Result<(), BlockSourceError>;

    /// Stops delivering blocks.
    ///
    /// No listener is invoked once this returns. Calling it on a source which is not started is a
    /// no-op.
    async fn stop(&self) -> Result<(), BlockSourceError>;

    /// Registers a listener for delivered blocks.
    ///
    /// The listener only receives blocks delivered after its registration.
    fn on_block(&self, listener: BlockListener) -> ListenerId;

    /// Registers a listener for errors which end live delivery.
    fn on_error(&self, listener: ErrorListener) -> ListenerId;

    /// Detaches a single listener. Returns `false` if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Detaches every registered listener. Delivery itself keeps running.
    fn remove_all_listeners(&self);

    /// Returns the highest rollup id known to this source, or `None` if none is known yet.
    ///
    /// Consumers compare this with the last block returned by
    /// [`get_blocks`](Self::get_blocks) to find out whether further requests are needed.
    fn latest_rollup_id(&self) -> Option<RollupId>;

    /// Registers a listener which forwards delivered blocks into a channel.
    fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<Arc<Block>>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.on_block(Box::new(move |block: Arc<Block>| {
            // The receiver going away only means the subscriber lost interest.
            let _ = sender.send(block);
        }));

        (id, receiver)
    }
}
