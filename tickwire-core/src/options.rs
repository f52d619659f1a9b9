//! Socket configuration options
//!
//! Shared policy applied to every socket a client or server creates:
//! kernel buffer sizes, Nagle, keep-alive, and the two framing limits that
//! size each connection's content buffers.

use std::time::Duration;

/// Default maximum message size (16 KiB).
///
/// Every message is prefixed with its length, so an attacker can declare a
/// 2 GiB payload to make the receiver allocate. Declared sizes above this
/// limit close the connection before anything is read or allocated.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024;

/// Default per-tick receive cap for server connections.
pub const DEFAULT_SERVER_RECEIVES_PER_TICK: usize = 10;

/// Default per-tick receive cap for the client.
///
/// Higher than the server's: a server is not going to flood its clients,
/// and clients usually receive far more than they send.
pub const DEFAULT_CLIENT_RECEIVES_PER_TICK: usize = 1000;

/// Default kernel send/receive buffer size (7 MiB).
///
/// Large buffers replace send queues: if 7 MiB of unsent data pile up, the
/// peer has effectively timed out and the connection is dropped. 7 MiB is
/// the largest size macOS accepts before `ENOBUFS`.
pub const DEFAULT_SOCKET_BUFFER_SIZE: usize = 7 * 1024 * 1024;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use tickwire_core::options::TransportOptions;
///
/// let opts = TransportOptions::server()
///     .with_max_message_size(64 * 1024)
///     .with_no_delay(true);
/// assert_eq!(opts.max_receives_per_tick, 10);
/// ```
///
/// # Runtime changes
///
/// `max_message_size` and `max_receives_per_tick` size a connection's
/// content buffers once, when the connection is created. Changing them
/// afterwards only affects connections created later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Largest payload accepted on receive and allowed on send.
    pub max_message_size: usize,

    /// Most messages drained from one connection in one tick.
    ///
    /// Draining everything that is available would let a peer streaming
    /// tiny valid messages keep the caller's tick busy forever. Draining
    /// only one per tick lets a fast-ticking peer build an ever growing
    /// backlog. A few per tick bounds both.
    pub max_receives_per_tick: usize,

    /// SO_SNDBUF in bytes
    pub send_buffer_size: usize,

    /// SO_RCVBUF in bytes
    pub recv_buffer_size: usize,

    /// TCP_NODELAY: disables Nagle. Lowers latency, raises bandwidth.
    pub no_delay: bool,

    /// SO_KEEPALIVE: detect dead peers and pulled wires.
    pub keepalive: bool,

    /// Upper bound on a client connect attempt.
    /// - `Duration::ZERO` (default): leave it to the sockets layer
    pub connect_timeout: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::server()
    }
}

impl TransportOptions {
    /// Create options with server defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults for server connections.
    #[must_use]
    pub const fn server() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_receives_per_tick: DEFAULT_SERVER_RECEIVES_PER_TICK,
            send_buffer_size: DEFAULT_SOCKET_BUFFER_SIZE,
            recv_buffer_size: DEFAULT_SOCKET_BUFFER_SIZE,
            no_delay: false,
            keepalive: true,
            connect_timeout: Duration::ZERO,
        }
    }

    /// Defaults for the client connection.
    #[must_use]
    pub const fn client() -> Self {
        let mut opts = Self::server();
        opts.max_receives_per_tick = DEFAULT_CLIENT_RECEIVES_PER_TICK;
        opts
    }

    /// Set the maximum message size.
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the per-connection, per-tick receive cap.
    ///
    /// A value of zero is raised to one so a connection can always make
    /// progress.
    pub fn with_max_receives_per_tick(mut self, count: usize) -> Self {
        self.max_receives_per_tick = count.max(1);
        self
    }

    /// Set SO_SNDBUF.
    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    /// Set SO_RCVBUF.
    pub fn with_recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = size;
        self
    }

    /// Set both kernel buffer sizes (convenience method).
    pub fn with_buffer_sizes(mut self, send_size: usize, recv_size: usize) -> Self {
        self.send_buffer_size = send_size;
        self.recv_buffer_size = recv_size;
        self
    }

    /// Enable or disable TCP_NODELAY.
    pub fn with_no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Enable or disable SO_KEEPALIVE.
    pub fn with_keepalive(mut self, enabled: bool) -> Self {
        self.keepalive = enabled;
        self
    }

    /// Set the client connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Number of content buffers a new connection gets.
    #[inline]
    pub fn content_buffers(&self) -> usize {
        self.max_receives_per_tick.max(1)
    }

    /// Check whether a payload of `len` bytes may be sent or received.
    #[inline]
    pub const fn allows(&self, len: usize) -> bool {
        len <= self.max_message_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults() {
        let opts = TransportOptions::default();
        assert_eq!(opts.max_message_size, 16 * 1024);
        assert_eq!(opts.max_receives_per_tick, 10);
        assert_eq!(opts.send_buffer_size, 7 * 1024 * 1024);
        assert_eq!(opts.recv_buffer_size, 7 * 1024 * 1024);
        assert!(!opts.no_delay);
        assert!(opts.keepalive);
        assert_eq!(opts.connect_timeout, Duration::ZERO);
    }

    #[test]
    fn test_client_defaults() {
        let opts = TransportOptions::client();
        assert_eq!(opts.max_receives_per_tick, 1000);
        assert_eq!(opts.max_message_size, TransportOptions::server().max_message_size);
    }

    #[test]
    fn test_builder_pattern() {
        let opts = TransportOptions::new()
            .with_max_message_size(1024)
            .with_max_receives_per_tick(3)
            .with_buffer_sizes(65536, 131072)
            .with_no_delay(true)
            .with_keepalive(false)
            .with_connect_timeout(Duration::from_secs(2));

        assert_eq!(opts.max_message_size, 1024);
        assert_eq!(opts.max_receives_per_tick, 3);
        assert_eq!(opts.send_buffer_size, 65536);
        assert_eq!(opts.recv_buffer_size, 131072);
        assert!(opts.no_delay);
        assert!(!opts.keepalive);
        assert_eq!(opts.connect_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_zero_receives_clamped() {
        let opts = TransportOptions::new().with_max_receives_per_tick(0);
        assert_eq!(opts.max_receives_per_tick, 1);
        assert_eq!(opts.content_buffers(), 1);
    }

    #[test]
    fn test_allows() {
        let opts = TransportOptions::new().with_max_message_size(5);
        assert!(opts.allows(0));
        assert!(opts.allows(5));
        assert!(!opts.allows(6));
    }
}
