//! Sockets capability seam.
//!
//! Everything above this module talks to a connected socket only through
//! [`Stream`]: peek, recv, send, pending error, peer address, shutdown.
//! `std::net::TcpStream` implements it; tests use an in-memory stream.
//!
//! [`SocketSlot`] holds a connection's socket as `Open(stream)` or
//! `Closed`. Closing takes the stream out of the slot, so closing the same
//! handle twice cannot be expressed.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use tracing::{debug, trace};

/// Non-blocking byte stream operations required by the transport.
///
/// All methods must return immediately. "Nothing to do right now" is
/// reported as `io::ErrorKind::WouldBlock`.
pub trait Stream {
    /// Copy queued bytes into `buf` without consuming them.
    ///
    /// Returns how many bytes were copied, which is less than `buf.len()`
    /// when fewer are queued. `Ok(0)` for a non-empty `buf` means the peer
    /// closed its side.
    fn peek(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Consume up to `buf.len()` queued bytes.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Queue up to `buf.len()` bytes for sending.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Take the socket's pending error (SO_ERROR), if any.
    fn take_error(&self) -> io::Result<Option<io::Error>>;

    fn peer_addr(&self) -> io::Result<SocketAddr>;

    /// Shut down both directions ahead of dropping the handle.
    fn shutdown(&self) -> io::Result<()>;
}

impl Stream for TcpStream {
    #[inline]
    fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
        TcpStream::peek(self, buf)
    }

    #[inline]
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    #[inline]
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write(buf)
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        TcpStream::take_error(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        TcpStream::peer_addr(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Check whether the peer is gone.
///
/// A pending socket error counts, as does an orderly close (a one byte peek
/// returning zero). Queued but unread data means the connection is still
/// alive from the reader's point of view: those bytes are delivered first.
pub fn was_disconnected<S: Stream>(stream: &S) -> bool {
    match stream.take_error() {
        Ok(Some(e)) => {
            trace!("pending socket error: {}", e);
            return true;
        }
        Ok(None) => {}
        Err(_) => return true,
    }

    let mut probe = [0u8; 1];
    match stream.peek(&mut probe) {
        Ok(0) => true,
        Ok(_) => false,
        Err(e) => !matches!(
            e.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
        ),
    }
}

/// A connection's socket handle: open, or already closed.
#[derive(Debug)]
pub enum SocketSlot<S> {
    Open(S),
    Closed,
}

impl<S: Stream> SocketSlot<S> {
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }

    #[inline]
    pub fn get(&self) -> Option<&S> {
        match self {
            Self::Open(s) => Some(s),
            Self::Closed => None,
        }
    }

    #[inline]
    pub fn get_mut(&mut self) -> Option<&mut S> {
        match self {
            Self::Open(s) => Some(s),
            Self::Closed => None,
        }
    }

    /// Close the socket if it is still open.
    ///
    /// Returns `true` if this call closed it.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(self, Self::Closed) {
            Self::Open(stream) => {
                // peer may already be gone; that is fine
                if let Err(e) = stream.shutdown() {
                    if e.kind() != io::ErrorKind::NotConnected {
                        debug!("socket shutdown failed: {}", e);
                    }
                }
                drop(stream);
                true
            }
            Self::Closed => false,
        }
    }

    /// Closed slots and peers that went away both count as disconnected.
    pub fn was_disconnected(&self) -> bool {
        self.get().map_or(true, was_disconnected)
    }
}

impl<S> From<S> for SocketSlot<S> {
    fn from(stream: S) -> Self {
        Self::Open(stream)
    }
}
