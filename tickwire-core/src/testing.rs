//! In-memory [`Stream`] for framing-level tests and fuzzing.
//!
//! [`MemoryStream::pair`] returns the stream the transport reads from and
//! a [`MemoryPeer`] handle that plays the remote side: it queues inbound
//! bytes, closes or breaks the connection, limits send capacity, and
//! exposes what the transport wrote.

use std::collections::VecDeque;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec::encode_header;
use crate::stream::Stream;

#[derive(Debug, Default)]
struct Shared {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    peer_closed: bool,
    local_shutdown: bool,
    pending_error: Option<io::ErrorKind>,
    send_capacity: Option<usize>,
    recv_calls: usize,
}

/// Local end of an in-memory connection.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    shared: Arc<Mutex<Shared>>,
    peer_addr: SocketAddr,
}

/// Remote end of an in-memory connection.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    shared: Arc<Mutex<Shared>>,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl MemoryStream {
    /// Create a connected pair.
    pub fn pair() -> (Self, MemoryPeer) {
        let shared = Arc::new(Mutex::new(Shared::default()));
        let stream = Self {
            shared: shared.clone(),
            peer_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 40_000)),
        };
        (stream, MemoryPeer { shared })
    }
}

impl MemoryPeer {
    /// Queue raw bytes for the stream to read.
    pub fn push(&self, bytes: &[u8]) {
        lock(&self.shared).inbound.extend(bytes);
    }

    /// Queue one length-prefixed message.
    pub fn push_frame(&self, payload: &[u8]) {
        let mut shared = lock(&self.shared);
        shared.inbound.extend(encode_header(payload.len() as u32));
        shared.inbound.extend(payload);
    }

    /// Orderly close: reads drain what is queued, then see end of stream.
    pub fn close(&self) {
        lock(&self.shared).peer_closed = true;
    }

    /// Make the socket report `kind` as its pending error.
    pub fn fail(&self, kind: io::ErrorKind) {
        lock(&self.shared).pending_error = Some(kind);
    }

    /// Limit how many more bytes the stream may send.
    pub fn set_send_capacity(&self, bytes: usize) {
        lock(&self.shared).send_capacity = Some(bytes);
    }

    /// Everything the stream has sent so far.
    pub fn sent(&self) -> Vec<u8> {
        lock(&self.shared).outbound.clone()
    }

    /// Bytes still queued for the stream.
    pub fn pending(&self) -> usize {
        lock(&self.shared).inbound.len()
    }

    /// Number of consuming reads the stream performed.
    pub fn recv_calls(&self) -> usize {
        lock(&self.shared).recv_calls
    }

    /// Whether the local side shut the stream down.
    pub fn is_shutdown(&self) -> bool {
        lock(&self.shared).local_shutdown
    }
}

impl Stream for MemoryStream {
    fn peek(&self, buf: &mut [u8]) -> io::Result<usize> {
        let shared = lock(&self.shared);
        if shared.local_shutdown {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if shared.inbound.is_empty() {
            return if shared.peer_closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = buf.len().min(shared.inbound.len());
        for (dst, src) in buf.iter_mut().zip(shared.inbound.iter()).take(n) {
            *dst = *src;
        }
        Ok(n)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut shared = lock(&self.shared);
        shared.recv_calls += 1;
        if shared.inbound.is_empty() {
            return if shared.peer_closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }
        let n = buf.len().min(shared.inbound.len());
        for (dst, src) in buf.iter_mut().zip(shared.inbound.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut shared = lock(&self.shared);
        if shared.local_shutdown || shared.peer_closed {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let n = match shared.send_capacity {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(cap) => {
                let n = cap.min(buf.len());
                shared.send_capacity = Some(cap - n);
                n
            }
            None => buf.len(),
        };
        shared.outbound.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
        Ok(lock(&self.shared).pending_error.take().map(io::Error::from))
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.peer_addr)
    }

    fn shutdown(&self) -> io::Result<()> {
        lock(&self.shared).local_shutdown = true;
        Ok(())
    }
}
