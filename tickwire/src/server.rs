//! Many inbound connections, drained once per tick.
//!
//! Single-threaded and cooperative: all work happens inside `drain` and
//! `send`, and neither blocks. Each `drain`:
//!
//! 1. tries exactly one `accept`
//! 2. visits every connection once, announcing new ones and reading up to
//!    `max_receives_per_tick` messages from each
//! 3. closes and removes every connection that went away, emitting one
//!    `Disconnected` for each

use hashbrown::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use tickwire_core::error::{FrameError, SendError, TransportError};
use tickwire_core::framed::FrameWriter;
use tickwire_core::options::TransportOptions;
use tickwire_core::stream::Stream;
use tickwire_core::tcp;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::event::{ConnectionId, Event};

/// Server side of the transport.
///
/// Connection ids start at 1 and are never reused by one `Server`, not
/// even across [`stop`](Self::stop) and [`start`](Self::start).
#[derive(Debug)]
pub struct Server<S: Stream = TcpStream> {
    options: TransportOptions,
    listener: Option<TcpListener>,
    connections: HashMap<ConnectionId, Connection<S>>,
    next_id: u32,
    removals: Vec<ConnectionId>,
    writer: FrameWriter,
}

impl Server<TcpStream> {
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        Self::with_options(options)
    }

    /// Bind and listen on `port` on every interface.
    ///
    /// Dual-stack where IPv6 is available, IPv4 otherwise. Port 0 picks an
    /// ephemeral port; see [`local_addr`](Self::local_addr).
    ///
    /// # Errors
    ///
    /// [`TransportError::AlreadyActive`] if already listening, or the
    /// socket error that stopped the listener from being created. The
    /// server stays inactive on error.
    pub fn start(&mut self, port: u16) -> Result<(), TransportError> {
        if self.listener.is_some() {
            warn!("[SERVER] start ignored: already listening");
            return Err(TransportError::AlreadyActive);
        }
        let listener = tcp::listen(port, &self.options).map_err(|e| {
            error!("[SERVER] failed to listen on port {}: {}", port, e);
            e
        })?;
        match listener.local_addr() {
            Ok(addr) => info!("[SERVER] listening on {}", addr),
            Err(_) => info!("[SERVER] listening on port {}", port),
        }
        self.listener = Some(listener);
        Ok(())
    }

    /// Process one tick: one accept, then reads and cleanup.
    pub fn drain(&mut self, out: &mut Vec<Event>) {
        self.accept_one();
        self.drain_connections(out);
    }

    fn accept_one(&mut self) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        match listener.accept() {
            Ok((stream, addr)) => {
                tcp::configure_stream(&stream, &self.options);
                let id = self.insert(stream);
                debug!("[SERVER] accepted connection {} from {}", id, addr);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => error!("[SERVER] accept failed: {}", e),
        }
    }

    /// Address of the listening socket.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }
}

impl<S: Stream> Server<S> {
    /// Server over any [`Stream`] type; connections are added with
    /// [`insert`](Self::insert).
    #[must_use]
    pub fn with_options(options: TransportOptions) -> Self {
        let writer = FrameWriter::new(options.max_message_size);
        Self {
            options,
            listener: None,
            connections: HashMap::new(),
            next_id: 1,
            removals: Vec::new(),
            writer,
        }
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Replace the options used for connections accepted from now on.
    ///
    /// Existing connections keep their buffers.
    pub fn set_options(&mut self, options: TransportOptions) {
        self.writer = FrameWriter::new(options.max_message_size);
        self.options = options;
    }

    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.listener.is_some()
    }

    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Track an established stream under a fresh id.
    ///
    /// `Connected` is emitted by the next `drain`.
    pub fn insert(&mut self, stream: S) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.connections
            .insert(id, Connection::new(id, stream, &self.options));
        id
    }

    /// Process one tick for already-accepted connections.
    pub fn drain_connections(&mut self, out: &mut Vec<Event>) {
        self.removals.clear();

        for (id, connection) in &mut self.connections {
            if connection.announce() {
                out.push(Event::Connected { id: *id });
            }

            if connection.was_disconnected() {
                self.removals.push(*id);
                continue;
            }

            match connection.read_into(out) {
                Ok(_) => {}
                Err(FrameError::Oversized { size, max }) => {
                    let peer = connection
                        .peer_addr()
                        .map_or_else(|| "unknown".to_string(), |a| a.to_string());
                    warn!(
                        "[SERVER] possible allocation attack with a header of {} bytes (max {}) from connection {} ({})",
                        size, max, id, peer
                    );
                    self.removals.push(*id);
                }
                Err(FrameError::Io(e)) => {
                    debug!("[SERVER] read failed for connection {}: {}", id, e);
                    self.removals.push(*id);
                }
            }
        }

        for id in self.removals.drain(..) {
            if let Some(mut connection) = self.connections.remove(&id) {
                connection.close();
                debug!("[SERVER] connection {} closed", id);
                out.push(Event::Disconnected { id });
            }
        }
    }

    /// Send one message to connection `id`.
    ///
    /// # Errors
    ///
    /// - [`SendError::MessageTooLarge`] above `max_message_size`; nothing is sent
    /// - [`SendError::UnknownConnection`] if `id` is not connected
    /// - [`SendError::Full`] when the send buffer is exhausted; the socket is
    ///   closed and the next `drain` reports `Disconnected`
    pub fn send(&mut self, id: ConnectionId, payload: &[u8]) -> Result<(), SendError> {
        let max = self.options.max_message_size;
        if payload.len() > max {
            error!(
                "[SERVER] send: message too big: {} bytes, limit {}",
                payload.len(),
                max
            );
            return Err(SendError::MessageTooLarge {
                size: payload.len(),
                max,
            });
        }

        // unknown ids are routine: the peer may have just left
        let Some(connection) = self.connections.get_mut(&id) else {
            return Err(SendError::UnknownConnection);
        };

        let result = match connection.send(&mut self.writer, payload) {
            Err(SendError::NotConnected) => Err(SendError::UnknownConnection),
            other => other,
        };
        if result == Err(SendError::Full) {
            error!("[SERVER] send buffer full for connection {}, closing", id);
        }
        result
    }

    /// Close connection `id` without emitting an event.
    ///
    /// The next `drain` notices the closed socket and reports
    /// `Disconnected`. Returns whether `id` was known.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        match self.connections.get_mut(&id) {
            Some(connection) => {
                connection.close();
                true
            }
            None => false,
        }
    }

    /// Remote address of connection `id`.
    pub fn client_address(&self, id: ConnectionId) -> Option<SocketAddr> {
        self.connections.get(&id).and_then(Connection::peer_addr)
    }

    /// Close every connection and the listener.
    ///
    /// Emits no events. The id counter carries on where it was.
    pub fn stop(&mut self) {
        for connection in self.connections.values_mut() {
            connection.close();
        }
        self.connections.clear();
        self.removals.clear();
        if self.listener.take().is_some() {
            info!("[SERVER] stopped");
        }
    }
}

impl<S: Stream> Drop for Server<S> {
    fn drop(&mut self) {
        self.stop();
    }
}
