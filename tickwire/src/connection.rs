//! Per-connection state shared by client and server.

use std::io;
use std::net::{SocketAddr, TcpStream};
use tickwire_core::codec::{FrameReader, Phase};
use tickwire_core::error::{FrameError, SendError};
use tickwire_core::framed::FrameWriter;
use tickwire_core::options::TransportOptions;
use tickwire_core::stream::{SocketSlot, Stream};

use crate::event::{ConnectionId, Event};

/// One framed connection: its socket slot, its frame reader and whether
/// `Connected` has been reported yet.
///
/// The reader's buffers are sized from the options in force when the
/// connection was created; later option changes do not resize them.
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    id: ConnectionId,
    slot: SocketSlot<S>,
    reader: FrameReader,
    connect_processed: bool,
}

impl<S: Stream> Connection<S> {
    /// Wrap an established stream.
    pub fn new(id: ConnectionId, stream: S, options: &TransportOptions) -> Self {
        Self {
            id,
            slot: SocketSlot::Open(stream),
            reader: FrameReader::from_options(options),
            connect_processed: false,
        }
    }

    /// Framing state for a connection whose socket is not established yet.
    pub fn detached(id: ConnectionId, options: &TransportOptions) -> Self {
        Self {
            id,
            slot: SocketSlot::Closed,
            reader: FrameReader::from_options(options),
            connect_processed: false,
        }
    }

    /// Install the established stream, closing any previous one.
    pub fn attach(&mut self, stream: S) {
        self.slot.close();
        self.slot = SocketSlot::Open(stream);
        self.reader.reset();
    }

    #[inline]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.slot.is_open()
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.reader.phase()
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.slot.get().and_then(|s| s.peer_addr().ok())
    }

    /// Mark `Connected` as reported. Returns `true` the first time only.
    pub fn announce(&mut self) -> bool {
        !std::mem::replace(&mut self.connect_processed, true)
    }

    /// Closed locally, closed by the peer, or failed.
    pub fn was_disconnected(&self) -> bool {
        self.slot.was_disconnected()
    }

    /// Close the socket. Returns `true` if it was still open.
    pub fn close(&mut self) -> bool {
        self.slot.close()
    }

    /// Append up to one batch of `Data` events. Returns how many.
    pub fn read_into(&mut self, out: &mut Vec<Event>) -> Result<usize, FrameError> {
        let Some(stream) = self.slot.get_mut() else {
            return Err(FrameError::Io(io::ErrorKind::NotConnected.into()));
        };
        let id = self.id;
        self.reader
            .read_batch(stream, |payload| out.push(Event::Data { id, payload }))
    }

    /// Send one message through `writer`.
    ///
    /// The size limit is the caller's to check. On [`SendError::Full`] the
    /// socket is closed here; the caller reports `Disconnected` later.
    pub fn send(&mut self, writer: &mut FrameWriter, payload: &[u8]) -> Result<(), SendError> {
        let Some(stream) = self.slot.get_mut() else {
            return Err(SendError::NotConnected);
        };
        let result = writer.write_all_or_fail(stream, payload);
        if result == Err(SendError::Full) {
            self.slot.close();
        }
        result
    }
}
