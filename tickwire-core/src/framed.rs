//! Framed I/O primitives over a [`Stream`].
//!
//! - [`read_exact_if_available`]: read exactly `n` bytes, or nothing at all
//! - [`FrameWriter`]: send `header ++ payload` in one write, or fail
//!
//! There is no send queue. Sockets get multi-megabyte kernel buffers
//! instead; a write that does not fit means the peer stopped reading, and
//! the caller treats it like a timeout.

use bytes::{BufMut, BytesMut};
use std::io;
use tracing::{error, trace};

use crate::codec::HEADER_LEN;
use crate::error::SendError;
use crate::stream::Stream;

/// Fill `buf` from `stream` if (and only if) that many bytes are queued.
///
/// Returns:
/// - `Ok(true)` → `buf` filled, bytes consumed
/// - `Ok(false)` → not enough queued yet, nothing consumed
/// - `Err` → the socket failed or the peer closed it; never retry
///
/// An empty `buf` is always ready and touches nothing.
pub fn read_exact_if_available<S: Stream>(stream: &mut S, buf: &mut [u8]) -> io::Result<bool> {
    if buf.is_empty() {
        return Ok(true);
    }

    let available = match stream.peek(buf) {
        Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
        Ok(n) => n,
        Err(e) if is_transient(&e) => return Ok(false),
        Err(e) => return Err(e),
    };
    if available < buf.len() {
        return Ok(false);
    }

    // The bytes are queued; this normally completes in a single recv.
    let mut filled = 0;
    while filled < buf.len() {
        match stream.recv(&mut buf[filled..]) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

#[inline]
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Encodes and sends whole messages through a reused scratch buffer.
///
/// Header and payload go out in a single write so that with TCP_NODELAY a
/// small message is one packet, not two.
#[derive(Debug)]
pub struct FrameWriter {
    scratch: BytesMut,
}

impl FrameWriter {
    /// Create a writer sized for messages up to `max_message_size`.
    #[must_use]
    pub fn new(max_message_size: usize) -> Self {
        Self {
            scratch: BytesMut::with_capacity(HEADER_LEN + max_message_size),
        }
    }

    /// Encode `payload` as `[u32 BE length][payload]` into the scratch
    /// buffer and return the encoded frame.
    ///
    /// Callers check `payload` against `max_message_size` first, which is
    /// far below `u32::MAX`.
    pub fn encode(&mut self, payload: &[u8]) -> &[u8] {
        debug_assert!(u32::try_from(payload.len()).is_ok());
        self.scratch.clear();
        self.scratch.put_u32(payload.len() as u32);
        self.scratch.extend_from_slice(payload);
        &self.scratch[..]
    }

    /// Send one message with a single write.
    ///
    /// Any error, would-block or short write returns [`SendError::Full`]:
    /// the kernel buffer could not take the whole frame, and a partial
    /// frame has already corrupted the stream. The caller must close the
    /// connection.
    pub fn write_all_or_fail<S: Stream>(
        &mut self,
        stream: &mut S,
        payload: &[u8],
    ) -> Result<(), SendError> {
        let frame = self.encode(payload);
        loop {
            match stream.send(frame) {
                Ok(n) if n == frame.len() => {
                    trace!("sent frame of {} bytes", frame.len());
                    return Ok(());
                }
                Ok(n) => {
                    error!("send buffer full: wrote {} of {} bytes", n, frame.len());
                    return Err(SendError::Full);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("send failed: {}", e);
                    return Err(SendError::Full);
                }
            }
        }
    }
}
