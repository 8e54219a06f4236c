//! Packet reassembly worker (spec §4.5): turns a stream of arbitrarily-
//! fragmented byte chunks back into whole frames, using either single-byte
//! length-prefixed framing or a variable-length header + length-field
//! scheme.

pub mod buffer;
pub mod framing;
pub mod worker;

pub use buffer::ReassemblyBuffer;
pub use framing::{FramingStrategy, SimpleFraming, VariableLengthFraming};
pub use worker::{CollectingSink, FrameSink, PacketWorker};
