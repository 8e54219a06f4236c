//! The selector's external interface (spec §6): how an application finds
//! out a channel is ready, a frame arrived, or a channel closed.

use bytes::Bytes;
use spark_core::error::CoreError;
use spark_core::ids::ChannelId;
use spark_framing::FrameSink;

/// Callback surface an application implements to drive behavior off
/// selector events. All default to no-ops so callers only override what
/// they need.
#[allow(unused_variables)]
pub trait SelectorEvents {
    /// A channel finished connecting/accepting and (if secure) completed
    /// its handshake; it is now ready for application reads and writes.
    fn on_ready(&mut self, channel: ChannelId) {}

    /// A complete frame was reassembled from `channel`'s byte stream.
    fn on_frame(&mut self, channel: ChannelId, frame: Bytes) {}

    /// `channel` was closed, gracefully or otherwise. `cause` is `None` for
    /// a clean, locally-initiated close.
    fn on_closed(&mut self, channel: ChannelId, cause: Option<CoreError>) {}

    /// Called after every dispatched event; lets an implementation queue
    /// writes without needing its own handle back into the selector, which
    /// is unavailable mid-callback since the selector already holds `&mut
    /// self` for the duration of `run`. Default: nothing queued.
    fn take_outbound(&mut self) -> Vec<(ChannelId, Bytes)> {
        Vec::new()
    }
}

/// Adapts a `&mut dyn SelectorEvents` into the `FrameSink` the packet
/// reassembly worker expects, so `Selector` doesn't have to implement
/// `FrameSink` itself.
pub struct EventsFrameSink<'a> {
    pub events: &'a mut dyn SelectorEvents,
}

impl<'a> FrameSink for EventsFrameSink<'a> {
    fn on_frame(&mut self, channel: ChannelId, frame: Bytes) {
        self.events.on_frame(channel, frame);
    }
}
