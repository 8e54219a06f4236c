//! The pending-changes-queue contract (spec §3/§4.1).
//!
//! The queue itself — a mutex-guarded FIFO plus a wakeup mechanism — is
//! owned by `spark-reactor`, since only the reactor's selector thread may
//! drain it. But the TLS channel state machine in `spark-transport-tls` and
//! the timeout manager in `spark-timeout` both need to *post* to it without
//! depending on `spark-reactor` (which depends on them). `ChangeSink` is
//! that inversion: anything that can accept a [`ChangeRequest`] implements
//! it, and `spark-reactor`'s concrete queue is the only real implementation
//! outside of tests.

use crate::ids::ChannelId;
use crate::ready::Interest;
use std::fmt;
use std::sync::Arc;

/// One entry in the pending-changes queue.
#[derive(Debug, Clone, Copy)]
pub struct ChangeRequest {
    pub channel: ChannelId,
    pub kind: ChangeKind,
}

impl ChangeRequest {
    pub const fn new(channel: ChannelId, kind: ChangeKind) -> Self {
        Self { channel, kind }
    }
}

/// What a [`ChangeRequest`] is asking the selector to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Update the channel's registered interest set (e.g. arm `WRITABLE`
    /// once data is queued, or drop it once the write buffer drains).
    InterestOps(Interest),
    /// A delegated task this channel was waiting on has finished; the
    /// selector should resume driving its handshake.
    TaskComplete,
    /// A timeout armed for this channel has fired; the selector should
    /// treat the channel as failed and close it.
    TimeoutExpired,
    /// The TLS session associated with this channel was invalidated (peer
    /// sent `close_notify`, or a fatal alert was raised) and should be torn
    /// down on the selector thread.
    SessionInvalidated,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::InterestOps(interest) => write!(f, "interest-ops({:#06b})", interest.bits()),
            ChangeKind::TaskComplete => f.write_str("task-complete"),
            ChangeKind::TimeoutExpired => f.write_str("timeout-expired"),
            ChangeKind::SessionInvalidated => f.write_str("session-invalidated"),
        }
    }
}

/// Anything a worker thread can hand a [`ChangeRequest`] to, without
/// knowing the concrete queue implementation behind it.
pub trait ChangeSink: Send + Sync {
    fn post(&self, change: ChangeRequest);
}

impl<T: ChangeSink + ?Sized> ChangeSink for Arc<T> {
    fn post(&self, change: ChangeRequest) {
        (**self).post(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        seen: Mutex<Vec<ChangeRequest>>,
    }

    impl ChangeSink for RecordingSink {
        fn post(&self, change: ChangeRequest) {
            self.seen.lock().unwrap().push(change);
        }
    }

    #[test]
    fn arc_change_sink_forwards() {
        let recording = Arc::new(RecordingSink {
            seen: Mutex::new(Vec::new()),
        });
        let sink: Arc<dyn ChangeSink> = recording.clone();
        let channel = ChannelId::from_raw(7);
        sink.post(ChangeRequest::new(channel, ChangeKind::TaskComplete));
        assert_eq!(recording.seen.lock().unwrap().len(), 1);
    }
}
