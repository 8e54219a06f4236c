//! The pending-changes queue (spec §3/§4.1): the one channel other threads
//! (the timeout manager, the delegated-task worker) use to talk to the
//! selector thread. A mutex-guarded FIFO plus a `mio::Waker` so posting a
//! change while the selector is blocked in `Poll::poll` wakes it
//! immediately instead of waiting for the next unrelated readiness event.

use mio::Waker;
use parking_lot::Mutex;
use spark_core::change::{ChangeRequest, ChangeSink};
use std::collections::VecDeque;
use std::sync::Arc;

pub struct PendingChanges {
    queue: Mutex<VecDeque<ChangeRequest>>,
    waker: Arc<Waker>,
}

impl PendingChanges {
    pub fn new(waker: Arc<Waker>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            waker,
        })
    }

    /// Drains every change currently queued. Called only from the selector
    /// thread, at the top of each loop iteration.
    pub fn drain(&self) -> Vec<ChangeRequest> {
        let mut queue = self.queue.lock();
        queue.drain(..).collect()
    }

    /// Drains at most `max` changes, for selectors configured to bound how
    /// much change-processing work one loop iteration can do.
    pub fn drain_up_to(&self, max: usize) -> Vec<ChangeRequest> {
        let mut queue = self.queue.lock();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    fn wake(&self) {
        if let Err(err) = self.waker.wake() {
            tracing::warn!(error = %err, "failed to wake selector after posting a change");
        }
    }
}

impl ChangeSink for PendingChanges {
    fn post(&self, change: ChangeRequest) {
        self.queue.lock().push_back(change);
        self.wake();
    }
}
