//! Per-channel growable append buffer (spec §4.5/§9): starts at
//! `buffer_size` bytes, grows by `max(need, buffer_size)` when more room is
//! required, and refuses to grow past `buffer_cap` — the hard ceiling a
//! REDESIGN FLAG adds so a peer trickling in an enormous declared frame
//! length can't grow one channel's buffer without bound.

use bytes::BytesMut;
use spark_core::error::CoreError;

pub struct ReassemblyBuffer {
    data: BytesMut,
    growth_step: usize,
    cap: usize,
}

impl ReassemblyBuffer {
    pub fn new(initial: usize, cap: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(initial),
            growth_step: initial,
            cap,
        }
    }

    /// Appends `chunk`, growing the backing allocation if needed. Fails if
    /// doing so would exceed the configured cap.
    pub fn append(&mut self, chunk: &[u8]) -> Result<(), CoreError> {
        let needed = self.data.len() + chunk.len();
        if needed > self.cap {
            return Err(CoreError::protocol(
                "framing.buffer_overflow",
                format!(
                    "reassembly buffer would grow to {needed} bytes, exceeding cap of {} bytes",
                    self.cap
                ),
            ));
        }
        if self.data.capacity() < needed {
            let shortfall = needed - self.data.capacity();
            self.data.reserve(shortfall.max(self.growth_step));
        }
        self.data.extend_from_slice(chunk);
        Ok(())
    }

    /// Drops the first `n` bytes, shifting any remainder to the front.
    pub fn consume(&mut self, n: usize) {
        let _ = self.data.split_to(n);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_past_initial_capacity() {
        let mut buf = ReassemblyBuffer::new(4, 4096);
        for _ in 0..10 {
            buf.append(&[0u8; 8]).unwrap();
        }
        assert_eq!(buf.len(), 80);
    }

    #[test]
    fn refuses_to_exceed_cap() {
        let mut buf = ReassemblyBuffer::new(4, 16);
        assert!(buf.append(&[0u8; 10]).is_ok());
        let err = buf.append(&[0u8; 10]).unwrap_err();
        assert_eq!(err.code(), "framing.buffer_overflow");
    }

    #[test]
    fn consume_shifts_remainder() {
        let mut buf = ReassemblyBuffer::new(8, 64);
        buf.append(b"hello world").unwrap();
        buf.consume(6);
        assert_eq!(buf.as_slice(), b"world");
    }
}
