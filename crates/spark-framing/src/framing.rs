//! Framing strategies: given the bytes accumulated so far for a channel,
//! decide whether a full frame is present at the front of the buffer and,
//! if so, how many bytes it occupies.
//!
//! Per spec §4.5: single-byte framing, where every byte in the buffer is
//! its own frame with no length interpretation, and a variable-length
//! scheme with a 1-2 byte opaque header followed by a 2-4 byte big-endian
//! length field that covers the payload only (the length field itself is
//! not included in the count, nor in the delivered frame — the header and
//! payload survive reassembly, per spec §8's "encode-then-decode... with
//! header H and payload B reproduces (H, B)").

use bytes::Bytes;

/// Extracts one frame at a time from the front of a byte buffer.
pub trait FramingStrategy: Send + Sync {
    /// Returns `Some((total_bytes_consumed, frame))` when a complete frame
    /// sits at the front of `buf`, `None` if more data is needed. `frame`
    /// carries whatever header bytes the strategy's wire format defines
    /// followed by the payload; any length-prefix bookkeeping the wire
    /// format uses to delimit the payload is not included.
    fn extract(&self, buf: &[u8]) -> Option<(usize, Bytes)>;
}

/// One byte per message: the byte itself is the frame, with no length or
/// payload to wait for. Emits one callback per byte and drains the buffer
/// fully.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFraming;

impl FramingStrategy for SimpleFraming {
    fn extract(&self, buf: &[u8]) -> Option<(usize, Bytes)> {
        let byte = *buf.first()?;
        Some((1, Bytes::copy_from_slice(&[byte])))
    }
}

/// `header_len` opaque bytes (never interpreted by this type — callers that
/// need to branch on them do so against the leading bytes of the delivered
/// frame) followed by a `length_field_len`-byte big-endian payload length,
/// followed by the payload itself. The length field is wire-only: the
/// delivered frame is the header immediately followed by the payload, with
/// the length field itself stripped out.
#[derive(Debug, Clone, Copy)]
pub struct VariableLengthFraming {
    header_len: u8,
    length_field_len: u8,
}

impl VariableLengthFraming {
    /// `header_len` must be 1 or 2; `length_field_len` must be 2 or 4.
    pub fn new(header_len: u8, length_field_len: u8) -> Self {
        assert!(
            matches!(header_len, 1 | 2),
            "header length must be 1 or 2 bytes, got {header_len}"
        );
        assert!(
            matches!(length_field_len, 2 | 4),
            "length field must be 2 or 4 bytes, got {length_field_len}"
        );
        Self {
            header_len,
            length_field_len,
        }
    }
}

impl FramingStrategy for VariableLengthFraming {
    fn extract(&self, buf: &[u8]) -> Option<(usize, Bytes)> {
        let header_len = self.header_len as usize;
        let length_field_len = self.length_field_len as usize;
        let prefix = header_len + length_field_len;
        if buf.len() < prefix {
            return None;
        }

        let length_bytes = &buf[header_len..prefix];
        let payload_len = match length_field_len {
            2 => u16::from_be_bytes(length_bytes.try_into().unwrap()) as usize,
            4 => u32::from_be_bytes(length_bytes.try_into().unwrap()) as usize,
            _ => unreachable!("constructor rejects any other length_field_len"),
        };

        let total = prefix + payload_len;
        if buf.len() < total {
            return None;
        }

        // The delivered frame is the header followed directly by the
        // payload — the length field itself is wire-only bookkeeping,
        // reconstructible from the payload's own length, so it is dropped
        // rather than handed to listeners.
        let mut frame = Vec::with_capacity(header_len + payload_len);
        frame.extend_from_slice(&buf[..header_len]);
        frame.extend_from_slice(&buf[prefix..total]);
        Some((total, Bytes::from(frame)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_framing_extracts_one_byte_at_a_time() {
        let framing = SimpleFraming;
        assert_eq!(framing.extract(&[]), None);
        let buf = [0x01, 0x02, 0x03];
        let (consumed, frame) = framing.extract(&buf).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(&frame[..], &[0x01]);
        let (consumed, frame) = framing.extract(&buf[1..]).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(&frame[..], &[0x02]);
    }

    #[test]
    fn variable_length_framing_two_two() {
        let framing = VariableLengthFraming::new(2, 2);
        let mut wire = vec![0xAB, 0xCD]; // header, preserved in the delivered frame
        wire.extend_from_slice(&3u16.to_be_bytes());
        wire.extend_from_slice(b"abc");
        wire.push(0xFF); // start of next frame

        let (consumed, frame) = framing.extract(&wire).unwrap();
        assert_eq!(consumed, 7);
        assert_eq!(&frame[..], &[0xAB, 0xCD, b'a', b'b', b'c']);
    }

    #[test]
    fn variable_length_framing_one_four() {
        let framing = VariableLengthFraming::new(1, 4);
        let mut wire = vec![0x01];
        wire.extend_from_slice(&0u32.to_be_bytes());
        let (consumed, frame) = framing.extract(&wire).unwrap();
        assert_eq!(consumed, 5);
        assert_eq!(&frame[..], &[0x01]);
    }

    #[test]
    #[should_panic]
    fn rejects_invalid_header_len() {
        VariableLengthFraming::new(3, 2);
    }
}
