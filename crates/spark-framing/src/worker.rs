//! The packet reassembly worker itself: tracks one [`ReassemblyBuffer`] and
//! [`FramingStrategy`] per registered channel, and a pending-channels queue
//! so the driver only has to revisit channels that actually received new
//! bytes since the last pass.
//!
//! `add_data` appends and enqueues the channel if it isn't already queued;
//! `process_ready` drains the queue, extracting every complete frame a
//! channel's buffer currently holds. A channel with only a partial frame
//! left over falls out of the queue and isn't re-added until its next
//! `add_data` call — there is no reason to keep re-checking a buffer that
//! hasn't changed.

use crate::buffer::ReassemblyBuffer;
use crate::framing::FramingStrategy;
use bytes::Bytes;
use spark_core::error::CoreError;
use spark_core::ids::ChannelId;
use std::collections::{HashMap, HashSet, VecDeque};

/// Receives frames as the worker extracts them.
pub trait FrameSink {
    fn on_frame(&mut self, channel: ChannelId, frame: Bytes);
}

/// A `FrameSink` that simply collects frames, useful for tests and for
/// callers that want to batch-process after a `process_ready` pass.
#[derive(Default)]
pub struct CollectingSink {
    pub frames: Vec<(ChannelId, Bytes)>,
}

impl FrameSink for CollectingSink {
    fn on_frame(&mut self, channel: ChannelId, frame: Bytes) {
        self.frames.push((channel, frame));
    }
}

struct ChannelState {
    buffer: ReassemblyBuffer,
    framing: Box<dyn FramingStrategy>,
}

pub struct PacketWorker {
    channels: HashMap<ChannelId, ChannelState>,
    pending: VecDeque<ChannelId>,
    queued: HashSet<ChannelId>,
    buffer_size: usize,
    buffer_cap: usize,
}

impl PacketWorker {
    pub fn new(buffer_size: usize, buffer_cap: usize) -> Self {
        Self {
            channels: HashMap::new(),
            pending: VecDeque::new(),
            queued: HashSet::new(),
            buffer_size,
            buffer_cap,
        }
    }

    /// Registers `channel` with the given framing strategy. Re-registering
    /// an already-known channel resets its buffer.
    pub fn register(&mut self, channel: ChannelId, framing: Box<dyn FramingStrategy>) {
        self.channels.insert(
            channel,
            ChannelState {
                buffer: ReassemblyBuffer::new(self.buffer_size, self.buffer_cap),
                framing,
            },
        );
    }

    pub fn unregister(&mut self, channel: ChannelId) {
        self.channels.remove(&channel);
        self.queued.remove(&channel);
    }

    /// Appends freshly-read bytes for `channel` and marks it ready for the
    /// next `process_ready` pass.
    pub fn add_data(&mut self, channel: ChannelId, chunk: &[u8]) -> Result<(), CoreError> {
        let state = self.channels.get_mut(&channel).ok_or_else(|| {
            CoreError::protocol(
                "framing.unknown_channel",
                format!("{channel} is not registered with the packet worker"),
            )
        })?;
        state.buffer.append(chunk)?;
        if self.queued.insert(channel) {
            self.pending.push_back(channel);
        }
        Ok(())
    }

    /// Drains the pending queue, handing every fully-reassembled frame to
    /// `sink` in arrival order.
    pub fn process_ready(&mut self, sink: &mut dyn FrameSink) {
        while let Some(channel) = self.pending.pop_front() {
            self.queued.remove(&channel);
            let Some(state) = self.channels.get_mut(&channel) else {
                continue;
            };
            loop {
                match state.framing.extract(state.buffer.as_slice()) {
                    Some((consumed, frame)) => {
                        state.buffer.consume(consumed);
                        sink.on_frame(channel, frame);
                    }
                    None => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{SimpleFraming, VariableLengthFraming};
    use proptest::prelude::*;

    #[test]
    fn simple_framing_emits_one_frame_per_byte() {
        let mut worker = PacketWorker::new(512, 1024 * 1024);
        let channel = ChannelId::from_raw(1);
        worker.register(channel, Box::new(SimpleFraming));

        worker.add_data(channel, &[0x01, 0x02, 0x03]).unwrap();

        let mut sink = CollectingSink::default();
        worker.process_ready(&mut sink);
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(&sink.frames[0].1[..], &[0x01]);
        assert_eq!(&sink.frames[1].1[..], &[0x02]);
        assert_eq!(&sink.frames[2].1[..], &[0x03]);
    }

    #[test]
    fn reassembles_across_fragment_boundary() {
        let mut worker = PacketWorker::new(512, 1024 * 1024);
        let channel = ChannelId::from_raw(2);
        worker.register(channel, Box::new(VariableLengthFraming::new(1, 2)));

        let frame = encode_variable(1, 2, b"hello");
        worker.add_data(channel, &frame[..2]).unwrap();
        worker.add_data(channel, &frame[2..4]).unwrap();
        worker.add_data(channel, &frame[4..]).unwrap();

        let mut sink = CollectingSink::default();
        worker.process_ready(&mut sink);
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(&sink.frames[0].1[..], b"\xeehello");
    }

    #[test]
    fn leftover_partial_frame_waits_for_more_data() {
        let mut worker = PacketWorker::new(512, 1024 * 1024);
        let channel = ChannelId::from_raw(3);
        worker.register(channel, Box::new(VariableLengthFraming::new(1, 2)));

        let frame = encode_variable(1, 2, b"hello");
        worker.add_data(channel, &frame[..frame.len() - 2]).unwrap();
        let mut sink = CollectingSink::default();
        worker.process_ready(&mut sink);
        assert!(sink.frames.is_empty());

        worker.add_data(channel, &frame[frame.len() - 2..]).unwrap();
        worker.process_ready(&mut sink);
        assert_eq!(sink.frames.len(), 1);
        assert_eq!(&sink.frames[0].1[..], b"\xeehello");
    }

    #[test]
    fn multiple_frames_in_one_chunk_all_extracted() {
        let mut worker = PacketWorker::new(512, 1024 * 1024);
        let channel = ChannelId::from_raw(4);
        worker.register(channel, Box::new(VariableLengthFraming::new(1, 2)));

        let mut wire = encode_variable(1, 2, b"abc");
        wire.extend_from_slice(&encode_variable(1, 2, b"xy"));
        worker.add_data(channel, &wire).unwrap();

        let mut sink = CollectingSink::default();
        worker.process_ready(&mut sink);
        assert_eq!(sink.frames.len(), 2);
        assert_eq!(&sink.frames[0].1[..], b"\xeeabc");
        assert_eq!(&sink.frames[1].1[..], b"\xeexy");
    }

    fn encode_variable(header_len: usize, length_field_len: usize, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xEE; header_len];
        match length_field_len {
            2 => out.extend_from_slice(&(payload.len() as u16).to_be_bytes()),
            4 => out.extend_from_slice(&(payload.len() as u32).to_be_bytes()),
            _ => unreachable!(),
        }
        out.extend_from_slice(payload);
        out
    }

    proptest! {
        #[test]
        fn reassembles_under_arbitrary_fragmentation(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..8),
            split_points in proptest::collection::vec(1usize..5, 0..32),
        ) {
            let header_len = 1usize;
            let length_field_len = 2usize;
            let mut wire = Vec::new();
            for payload in &payloads {
                wire.extend(encode_variable(header_len, length_field_len, payload));
            }

            // Fragment the wire into arbitrarily-sized chunks using the
            // split points as a cycling set of chunk sizes.
            let mut chunks = Vec::new();
            let mut idx = 0usize;
            let mut cursor = 0usize;
            while cursor < wire.len() {
                let size = if split_points.is_empty() {
                    wire.len() - cursor
                } else {
                    split_points[idx % split_points.len()].max(1)
                };
                idx += 1;
                let end = (cursor + size).min(wire.len());
                chunks.push(wire[cursor..end].to_vec());
                cursor = end;
            }

            let mut worker = PacketWorker::new(16, 1024 * 1024);
            let channel = ChannelId::from_raw(99);
            worker.register(
                channel,
                Box::new(VariableLengthFraming::new(header_len as u8, length_field_len as u8)),
            );

            let mut sink = CollectingSink::default();
            for chunk in chunks {
                worker.add_data(channel, &chunk).unwrap();
                worker.process_ready(&mut sink);
            }

            let got: Vec<Vec<u8>> = sink.frames.iter().map(|(_, f)| f.to_vec()).collect();
            let expected: Vec<Vec<u8>> = payloads
                .iter()
                .map(|payload| {
                    let mut framed = vec![0xEEu8; header_len];
                    framed.extend_from_slice(payload);
                    framed
                })
                .collect();
            prop_assert_eq!(got, expected);
        }
    }
}
