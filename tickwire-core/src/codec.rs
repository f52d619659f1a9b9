use bytes::Bytes;

use crate::buffer::BufferRing;
use crate::error::FrameError;
use crate::framed::read_exact_if_available;
use crate::options::TransportOptions;
use crate::stream::Stream;

/// Length prefix size: one `u32`, big-endian.
pub const HEADER_LEN: usize = 4;

#[inline]
#[must_use]
pub const fn encode_header(len: u32) -> [u8; HEADER_LEN] {
    len.to_be_bytes()
}

#[inline]
#[must_use]
pub const fn decode_header(header: [u8; HEADER_LEN]) -> u32 {
    u32::from_be_bytes(header)
}

/// Where a connection's reader is within the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingHeader,
    /// Header consumed; waiting for this many content bytes.
    AwaitingContent(usize),
}

/// Stateful per-connection message reader
///
/// Each advance either completes a whole step (header or content) or
/// consumes nothing:
/// - Header queued → decode, validate, move to content
/// - Content queued → fill a slot, hand out the payload
/// - Anything short → `Ok(None)`, try again next tick
///
/// A declared size above `max_message_size` is rejected before any content
/// buffer is touched.
#[derive(Debug)]
pub struct FrameReader {
    phase: Phase,
    header: [u8; HEADER_LEN],
    buffers: BufferRing,
    max_message_size: usize,
}

impl FrameReader {
    /// Reader delivering up to `per_tick` messages per batch.
    #[must_use]
    pub fn new(max_message_size: usize, per_tick: usize) -> Self {
        Self {
            phase: Phase::AwaitingHeader,
            header: [0; HEADER_LEN],
            buffers: BufferRing::new(per_tick, max_message_size),
            max_message_size,
        }
    }

    #[must_use]
    pub fn from_options(options: &TransportOptions) -> Self {
        Self::new(options.max_message_size, options.content_buffers())
    }

    #[inline]
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Messages a single batch can deliver.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffers.len()
    }

    pub fn reset(&mut self) {
        self.phase = Phase::AwaitingHeader;
    }

    /// Advance at most one message, reading content into slot `slot`.
    ///
    /// Returns:
    /// - `Ok(Some(payload))` → a whole message was read
    /// - `Ok(None)` → need more data
    /// - `Err` → oversized header or dead socket; close the connection
    pub fn poll_frame<S: Stream>(
        &mut self,
        stream: &mut S,
        slot: usize,
    ) -> Result<Option<Bytes>, FrameError> {
        let size = match self.phase {
            Phase::AwaitingContent(size) => size,
            Phase::AwaitingHeader => {
                if !read_exact_if_available(stream, &mut self.header)? {
                    return Ok(None);
                }
                let size = decode_header(self.header) as usize;
                if size > self.max_message_size {
                    return Err(FrameError::Oversized {
                        size,
                        max: self.max_message_size,
                    });
                }
                self.phase = Phase::AwaitingContent(size);
                size
            }
        };

        if size == 0 {
            self.phase = Phase::AwaitingHeader;
            return Ok(Some(Bytes::new()));
        }

        let buf = self.buffers.prepare(slot, size);
        if !read_exact_if_available(stream, buf)? {
            return Ok(None);
        }
        self.phase = Phase::AwaitingHeader;
        Ok(Some(self.buffers.take(slot)))
    }

    /// Read up to [`capacity`](Self::capacity) messages, passing each to
    /// `on_frame` in wire order.
    ///
    /// Stops early when the stream runs dry. Messages delivered before an
    /// error are not taken back. Returns how many were delivered.
    pub fn read_batch<S, F>(&mut self, stream: &mut S, mut on_frame: F) -> Result<usize, FrameError>
    where
        S: Stream,
        F: FnMut(Bytes),
    {
        let mut delivered = 0;
        for slot in 0..self.buffers.len() {
            match self.poll_frame(stream, slot)? {
                Some(payload) => {
                    on_frame(payload);
                    delivered += 1;
                }
                None => break,
            }
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStream;

    fn collect<S: Stream>(reader: &mut FrameReader, stream: &mut S) -> Vec<Bytes> {
        let mut out = Vec::new();
        reader.read_batch(stream, |p| out.push(p)).unwrap();
        out
    }

    #[test]
    fn test_header_byte_order() {
        assert_eq!(encode_header(5), [0, 0, 0, 5]);
        assert_eq!(encode_header(0x0102_0304), [1, 2, 3, 4]);
        assert_eq!(decode_header([0, 0, 1, 0]), 256);
    }

    #[test]
    fn test_single_message() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push(b"\x00\x00\x00\x05hello");

        let mut reader = FrameReader::new(16, 4);
        let frames = collect(&mut reader, &mut stream);
        assert_eq!(frames, vec![Bytes::from_static(b"hello")]);
        assert_eq!(reader.phase(), Phase::AwaitingHeader);
    }

    #[test]
    fn test_partial_header_waits() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push(&[0, 0]);

        let mut reader = FrameReader::new(16, 4);
        assert!(collect(&mut reader, &mut stream).is_empty());
        assert_eq!(reader.phase(), Phase::AwaitingHeader);
        assert_eq!(peer.pending(), 2);

        peer.push(&[0, 3]);
        peer.push(b"abc");
        assert_eq!(collect(&mut reader, &mut stream), vec![Bytes::from_static(b"abc")]);
    }

    #[test]
    fn test_partial_content_waits() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push(b"\x00\x00\x00\x05he");

        let mut reader = FrameReader::new(16, 4);
        assert!(collect(&mut reader, &mut stream).is_empty());
        assert_eq!(reader.phase(), Phase::AwaitingContent(5));
        assert_eq!(peer.pending(), 2);

        let calls = peer.recv_calls();
        assert!(collect(&mut reader, &mut stream).is_empty());
        assert_eq!(peer.recv_calls(), calls);

        peer.push(b"llo");
        assert_eq!(collect(&mut reader, &mut stream), vec![Bytes::from_static(b"hello")]);
        assert_eq!(reader.phase(), Phase::AwaitingHeader);
    }

    #[test]
    fn test_zero_length_message() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push_frame(b"");
        peer.push_frame(b"x");

        let mut reader = FrameReader::new(16, 4);
        let frames = collect(&mut reader, &mut stream);
        assert_eq!(frames.len(), 2);
        assert!(frames[0].is_empty());
        assert_eq!(&frames[1][..], b"x");
    }

    #[test]
    fn test_message_at_max_size() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push_frame(&[7u8; 16]);

        let mut reader = FrameReader::new(16, 4);
        let frames = collect(&mut reader, &mut stream);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 16);
    }

    #[test]
    fn test_oversized_header_rejected() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push(&encode_header(17));
        peer.push(&[0u8; 17]);

        let mut reader = FrameReader::new(16, 4);
        let mut frames = 0;
        let err = reader.read_batch(&mut stream, |_| frames += 1).unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(matches!(err, FrameError::Oversized { size: 17, max: 16 }));
        assert_eq!(frames, 0);
        // only the header was consumed
        assert_eq!(peer.pending(), 17);
    }

    #[test]
    fn test_batch_cap() {
        let (mut stream, peer) = MemoryStream::pair();
        for i in 0u8..5 {
            peer.push_frame(&[i]);
        }

        let mut reader = FrameReader::new(16, 3);
        assert_eq!(reader.capacity(), 3);

        let first = collect(&mut reader, &mut stream);
        assert_eq!(first.len(), 3);
        let second = collect(&mut reader, &mut stream);
        assert_eq!(second.len(), 2);

        let all: Vec<u8> = first.iter().chain(second.iter()).map(|p| p[0]).collect();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_payloads_survive_next_batch() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push_frame(b"first");

        let mut reader = FrameReader::new(16, 1);
        let kept = collect(&mut reader, &mut stream);

        peer.push_frame(b"second");
        let next = collect(&mut reader, &mut stream);

        assert_eq!(&kept[0][..], b"first");
        assert_eq!(&next[0][..], b"second");
    }

    #[test]
    fn test_messages_then_close() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push_frame(b"bye");
        peer.close();

        let mut reader = FrameReader::new(16, 4);
        let mut frames = Vec::new();
        let err = reader
            .read_batch(&mut stream, |p| frames.push(p))
            .unwrap_err();
        assert_eq!(frames, vec![Bytes::from_static(b"bye")]);
        assert!(!err.is_protocol_violation());
    }

    #[test]
    fn test_reset() {
        let (mut stream, peer) = MemoryStream::pair();
        peer.push(&encode_header(8));

        let mut reader = FrameReader::from_options(&TransportOptions::client());
        assert!(collect(&mut reader, &mut stream).is_empty());
        assert_eq!(reader.phase(), Phase::AwaitingContent(8));
        reader.reset();
        assert_eq!(reader.phase(), Phase::AwaitingHeader);
    }
}
