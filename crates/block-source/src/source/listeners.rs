use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
};

use super::{BlockListener, ErrorListener, ListenerId};
use crate::{block::Block, errors::BlockSourceError};

type SharedBlockListener = Arc<dyn Fn(Arc<Block>) + Send + Sync + 'static>;
type SharedErrorListener = Arc<dyn Fn(&BlockSourceError) + Send + Sync + 'static>;

/// Listeners registered with a block source, in registration order.
#[derive(Default)]
pub(super) struct ListenerRegistry {
    inner: Mutex<Listeners>,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    blocks: BTreeMap<ListenerId, SharedBlockListener>,
    errors: BTreeMap<ListenerId, SharedErrorListener>,
}

impl Listeners {
    fn next_id(&mut self) -> ListenerId {
        let id = ListenerId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

impl ListenerRegistry {
    pub fn add_block_listener(&self, listener: BlockListener) -> ListenerId {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.blocks.insert(id, Arc::from(listener));
        id
    }

    pub fn add_error_listener(&self, listener: ErrorListener) -> ListenerId {
        let mut inner = self.lock();
        let id = inner.next_id();
        inner.errors.insert(id, Arc::from(listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        inner.blocks.remove(&id).is_some() || inner.errors.remove(&id).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.blocks.clear();
        inner.errors.clear();
    }

    pub fn count(&self) -> usize {
        let inner = self.lock();
        inner.blocks.len() + inner.errors.len()
    }

    /// Invokes every block listener with `block`, one after the other.
    ///
    /// Listeners are called outside of the registry lock so they may register or remove
    /// listeners themselves. Such changes take effect from the next block.
    pub fn notify_block(&self, block: &Arc<Block>) {
        let listeners: Vec<_> = self.lock().blocks.values().cloned().collect();
        for listener in listeners {
            listener(Arc::clone(block));
        }
    }

    pub fn notify_error(&self, error: &BlockSourceError) {
        let listeners: Vec<_> = self.lock().errors.values().cloned().collect();
        for listener in listeners {
            listener(error);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Listeners> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
