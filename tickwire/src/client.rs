//! Single outbound connection.
//!
//! The blocking connect runs on a background thread; everything else
//! happens in `drain` and `send` on the caller's thread and never blocks.
//!
//! ```text
//! Idle ──connect──▶ Connecting ──ok──▶ Connected
//!   ▲                   │                  │
//!   └────── failed ─────┘◀── disconnect ───┘
//! ```
//!
//! A connect attempt that fails before the thread starts, or is cancelled
//! by `disconnect`, leaves an aborted notice behind so that the next
//! `drain` still reports one `Disconnected`.

use socket2::Socket;
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tickwire_core::endpoint::Endpoint;
use tickwire_core::error::{FrameError, SendError};
use tickwire_core::framed::FrameWriter;
use tickwire_core::options::TransportOptions;
use tickwire_core::tcp;
use tracing::{debug, error, info, warn};

use crate::connection::Connection;
use crate::event::{ConnectionId, Event};

/// A connect attempt in flight.
#[derive(Debug)]
struct PendingConnect {
    addr: SocketAddr,
    /// Shared with the worker only so that `disconnect` can shut it down.
    socket: Arc<Socket>,
    worker: JoinHandle<()>,
    result: flume::Receiver<io::Result<()>>,
}

#[derive(Debug)]
enum State {
    Idle,
    Connecting(PendingConnect),
    Connected,
}

/// Client side of the transport.
///
/// ```rust,no_run
/// use tickwire::{Client, Event, TransportOptions};
///
/// let mut client = Client::new(TransportOptions::client());
/// client.connect("127.0.0.1", 7777);
///
/// let mut events = Vec::new();
/// loop {
///     events.clear();
///     client.drain(&mut events);
///     for event in &events {
///         if let Event::Data { payload, .. } = event {
///             println!("{} bytes", payload.len());
///         }
///     }
///     # break;
/// }
/// ```
#[derive(Debug)]
pub struct Client {
    options: TransportOptions,
    state: State,
    connection: Option<Connection>,
    writer: FrameWriter,
    aborted: bool,
}

impl Client {
    #[must_use]
    pub fn new(options: TransportOptions) -> Self {
        let writer = FrameWriter::new(options.max_message_size);
        Self {
            options,
            state: State::Idle,
            connection: None,
            writer,
            aborted: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Replace the options used by future connects.
    ///
    /// A connection that already exists keeps its buffers.
    pub fn set_options(&mut self, options: TransportOptions) {
        self.options = options;
    }

    #[inline]
    #[must_use]
    pub const fn is_connecting(&self) -> bool {
        matches!(self.state, State::Connecting(_))
    }

    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected)
    }

    /// Start connecting to `host:port`.
    ///
    /// Does nothing while connecting or connected. Host resolution happens
    /// here and may block briefly; the TCP handshake does not. The outcome
    /// is reported by a later [`drain`](Self::drain).
    pub fn connect(&mut self, host: &str, port: u16) {
        if !matches!(self.state, State::Idle) {
            debug!("[CLIENT] connect ignored: already connecting or connected");
            return;
        }

        // size the framing state now; later option changes don't apply
        self.connection = Some(Connection::detached(ConnectionId::LOCAL, &self.options));
        self.writer = FrameWriter::new(self.options.max_message_size);

        let addr = match Endpoint::resolve(host, port) {
            Ok(endpoint) => endpoint.socket_addr(),
            Err(e) => {
                warn!("[CLIENT] connect: failed to resolve host {}: {}", host, e);
                self.abort();
                return;
            }
        };

        let socket = match tcp::new_socket_for(&addr) {
            Ok(socket) => Arc::new(socket),
            Err(e) => {
                error!("[CLIENT] connect: failed to create socket: {}", e);
                self.abort();
                return;
            }
        };

        let (tx, rx) = flume::bounded(1);
        let worker_socket = Arc::clone(&socket);
        let options = self.options.clone();
        let spawned = thread::Builder::new()
            .name("tickwire-connect".into())
            .spawn(move || {
                let result = tcp::connect(&worker_socket, &addr, options.connect_timeout)
                    .map(|()| tcp::configure_socket(&worker_socket, &options));
                let _ = tx.send(result);
            });

        match spawned {
            Ok(worker) => {
                info!("[CLIENT] connecting to {}", addr);
                self.state = State::Connecting(PendingConnect {
                    addr,
                    socket,
                    worker,
                    result: rx,
                });
            }
            Err(e) => {
                error!("[CLIENT] connect: failed to start connect thread: {}", e);
                self.abort();
            }
        }
    }

    fn abort(&mut self) {
        self.connection = None;
        self.state = State::Idle;
        self.aborted = true;
    }

    /// Report connect outcomes and read what arrived.
    ///
    /// At most `max_receives_per_tick` messages are appended per call.
    pub fn drain(&mut self, out: &mut Vec<Event>) {
        if std::mem::take(&mut self.aborted) {
            out.push(Event::Disconnected {
                id: ConnectionId::LOCAL,
            });
        }

        self.poll_connect(out);
        if !self.is_connected() {
            return;
        }

        let Some(connection) = self.connection.as_mut() else {
            self.teardown(out);
            return;
        };

        if connection.was_disconnected() {
            debug!("[CLIENT] connection closed");
            self.teardown(out);
            return;
        }

        match connection.read_into(out) {
            Ok(_) => {}
            Err(FrameError::Oversized { size, max }) => {
                warn!(
                    "[CLIENT] possible allocation attack with a header of {} bytes (max {})",
                    size, max
                );
                self.teardown(out);
            }
            Err(FrameError::Io(e)) => {
                debug!("[CLIENT] read failed: {}", e);
                self.teardown(out);
            }
        }
    }

    fn poll_connect(&mut self, out: &mut Vec<Event>) {
        let State::Connecting(pending) = &self.state else {
            return;
        };
        let result = match pending.result.try_recv() {
            Ok(result) => result,
            Err(flume::TryRecvError::Empty) => return,
            Err(flume::TryRecvError::Disconnected) => Err(io::Error::new(
                io::ErrorKind::Other,
                "connect thread exited without a result",
            )),
        };

        let State::Connecting(pending) = std::mem::replace(&mut self.state, State::Idle) else {
            return;
        };
        match Self::finish_connect(pending, result) {
            Ok(stream) => {
                if let Some(connection) = self.connection.as_mut() {
                    connection.attach(stream);
                    self.state = State::Connected;
                    info!("[CLIENT] connected");
                    out.push(Event::Connected {
                        id: ConnectionId::LOCAL,
                    });
                    return;
                }
                error!("[CLIENT] connected without framing state");
            }
            Err(e) => error!("[CLIENT] connect failed: {}", e),
        }
        self.connection = None;
        out.push(Event::Disconnected {
            id: ConnectionId::LOCAL,
        });
    }

    /// Join the worker, then take sole ownership of the socket.
    fn finish_connect(pending: PendingConnect, result: io::Result<()>) -> io::Result<TcpStream> {
        let PendingConnect {
            addr,
            socket,
            worker,
            ..
        } = pending;
        if worker.join().is_err() {
            return Err(io::Error::new(io::ErrorKind::Other, "connect thread panicked"));
        }
        result.map_err(|e| io::Error::new(e.kind(), format!("{addr}: {e}")))?;
        let socket = Arc::try_unwrap(socket).map_err(|_| {
            io::Error::new(io::ErrorKind::Other, "connect socket still shared after join")
        })?;
        tcp::into_stream(socket)
    }

    fn teardown(&mut self, out: &mut Vec<Event>) {
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        self.state = State::Idle;
        out.push(Event::Disconnected {
            id: ConnectionId::LOCAL,
        });
    }

    /// Send one message.
    ///
    /// # Errors
    ///
    /// - [`SendError::NotConnected`] while idle or still connecting
    /// - [`SendError::MessageTooLarge`] above `max_message_size`; nothing is sent
    /// - [`SendError::Full`] when the send buffer is exhausted; the socket is
    ///   closed and the next `drain` reports `Disconnected`
    pub fn send(&mut self, payload: &[u8]) -> Result<(), SendError> {
        let connection = match (&self.state, self.connection.as_mut()) {
            (State::Connected, Some(connection)) => connection,
            _ => {
                warn!("[CLIENT] send: not connected");
                return Err(SendError::NotConnected);
            }
        };

        let max = self.options.max_message_size;
        if payload.len() > max {
            error!(
                "[CLIENT] send: message too big: {} bytes, limit {}",
                payload.len(),
                max
            );
            return Err(SendError::MessageTooLarge {
                size: payload.len(),
                max,
            });
        }

        let result = connection.send(&mut self.writer, payload);
        if result == Err(SendError::Full) {
            error!("[CLIENT] send buffer full, closing connection");
        }
        result
    }

    /// Close the connection or cancel the attempt in flight.
    ///
    /// Returns once the connect thread (if any) has exited; `connect` may
    /// be called again right away. Closing an established connection emits
    /// no event. A cancelled attempt is reported as `Disconnected` by the
    /// next `drain`.
    pub fn disconnect(&mut self) {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Connecting(pending) => {
                // fails the blocking connect on the worker
                if let Err(e) = pending.socket.shutdown(std::net::Shutdown::Both) {
                    debug!("[CLIENT] shutdown of connecting socket: {}", e);
                }
                if pending.worker.join().is_err() {
                    error!("[CLIENT] connect thread panicked");
                }
                info!("[CLIENT] connect to {} cancelled", pending.addr);
                self.aborted = true;
            }
            State::Connected => info!("[CLIENT] disconnected"),
            State::Idle => {}
        }
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::{Duration, Instant};

    fn drain_until<F>(client: &mut Client, mut done: F) -> Vec<Event>
    where
        F: FnMut(&[Event]) -> bool,
    {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            client.drain(&mut events);
            if done(&events) {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        events
    }

    #[test]
    fn test_send_while_idle() {
        let mut client = Client::new(TransportOptions::client());
        assert_eq!(client.send(b"hi"), Err(SendError::NotConnected));
    }

    #[test]
    fn test_unresolvable_host_reports_once() {
        let mut client = Client::new(TransportOptions::client());
        client.connect("host.invalid", 7777);
        assert!(!client.is_connecting());

        let mut events = Vec::new();
        client.drain(&mut events);
        client.drain(&mut events);
        assert_eq!(
            events,
            vec![Event::Disconnected {
                id: ConnectionId::LOCAL
            }]
        );
    }

    #[test]
    fn test_connect_then_oversized_send() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = Client::new(TransportOptions::client().with_max_message_size(8));
        client.connect("127.0.0.1", port);
        assert!(client.is_connecting());

        // connecting is not connected
        assert_eq!(client.send(b"hi"), Err(SendError::NotConnected));

        let events = drain_until(&mut client, |e| !e.is_empty());
        assert_eq!(
            events,
            vec![Event::Connected {
                id: ConnectionId::LOCAL
            }]
        );
        assert!(client.is_connected());

        assert_eq!(
            client.send(&[0u8; 9]),
            Err(SendError::MessageTooLarge { size: 9, max: 8 })
        );
        assert!(client.send(&[0u8; 8]).is_ok());
    }

    #[test]
    fn test_second_connect_is_noop() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = Client::new(TransportOptions::client());
        client.connect("127.0.0.1", port);
        client.connect("127.0.0.1", port);

        let events = drain_until(&mut client, |e| !e.is_empty());
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Event::Connected { .. }));
    }

    #[test]
    fn test_disconnect_is_silent_and_reconnectable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut client = Client::new(TransportOptions::client());
        client.connect("127.0.0.1", port);
        drain_until(&mut client, |e| !e.is_empty());
        assert!(client.is_connected());

        client.disconnect();
        assert!(!client.is_connected());
        let mut events = Vec::new();
        client.drain(&mut events);
        assert!(events.is_empty());

        client.connect("127.0.0.1", port);
        let events = drain_until(&mut client, |e| !e.is_empty());
        assert!(matches!(events[0], Event::Connected { .. }));
    }
}
