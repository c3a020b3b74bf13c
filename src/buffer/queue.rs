use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMetrics {
    pub len: usize,
    pub pushed: u64,
    pub popped: u64,
    pub peak_size: usize,
}

struct State<T> {
    queue: VecDeque<T>,
    // Set by the consumer once it has observed the queue empty; cleared on push.
    drained: bool,
}

/// Unbounded FIFO channel between many producers and one delivery consumer.
///
/// The drained flag lives under the same lock as the queue, so a push can
/// never be lost between the consumer's last pop and `mark_drained`.
pub struct DeliveryChannel<T> {
    state: Mutex<State<T>>,
    drained_cv: Condvar,
    pushed: AtomicU64,
    popped: AtomicU64,
    peak_size: AtomicUsize,
}

impl<T> DeliveryChannel<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                queue: VecDeque::new(),
                drained: true,
            }),
            drained_cv: Condvar::new(),
            pushed: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            peak_size: AtomicUsize::new(0),
        }
    }

    /// Appends at the tail. Never blocks beyond the short queue lock.
    pub fn push(&self, item: T) {
        let len = {
            let mut state = self.state.lock();
            state.queue.push_back(item);
            state.drained = false;
            state.queue.len()
        };
        self.pushed.fetch_add(1, Ordering::Relaxed);
        self.peak_size.fetch_max(len, Ordering::Relaxed);
    }

    /// Pops from the head.
    pub fn pop(&self) -> Option<T> {
        let item = self.state.lock().queue.pop_front();
        if item.is_some() {
            self.popped.fetch_add(1, Ordering::Relaxed);
        }
        item
    }

    /// Sets the drained flag if the queue is empty right now and wakes waiters.
    ///
    /// Returns `false` when new items arrived since the last pop.
    pub fn mark_drained(&self) -> bool {
        let mut state = self.state.lock();
        if state.queue.is_empty() {
            state.drained = true;
            self.drained_cv.notify_all();
            true
        } else {
            false
        }
    }

    /// Clears the drained flag. Called by the consumer when it starts a drain pass.
    pub fn begin_drain(&self) {
        self.state.lock().drained = false;
    }

    pub fn is_drained(&self) -> bool {
        self.state.lock().drained
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Blocks until the drained flag is set or `timeout` elapses.
    ///
    /// Returns whether the channel was drained when the wait ended.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        if !state.drained {
            self.drained_cv
                .wait_while_for(&mut state, |state| !state.drained, timeout);
        }
        state.drained
    }

    pub fn metrics(&self) -> ChannelMetrics {
        ChannelMetrics {
            len: self.len(),
            pushed: self.pushed.load(Ordering::Relaxed),
            popped: self.popped.load(Ordering::Relaxed),
            peak_size: self.peak_size.load(Ordering::Relaxed),
        }
    }
}

impl<T> Default for DeliveryChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DeliveryChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DeliveryChannel")
            .field("len", &state.queue.len())
            .field("drained", &state.drained)
            .field("pushed", &self.pushed.load(Ordering::Relaxed))
            .field("popped", &self.popped.load(Ordering::Relaxed))
            .finish()
    }
}
