/// Tickwire Error Types
///
/// Per-connection failures never escape `drain`; they become a single
/// `Disconnected` event. These types cover the remaining surfaces: sends,
/// lifecycle calls, and the frame reader's verdicts.

use std::io;
use thiserror::Error;

use crate::endpoint::EndpointError;

/// Errors from starting a server or otherwise touching the sockets layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// IO error during socket creation, bind, listen or configuration
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Address could not be parsed or resolved
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),

    /// `start` called on a server that is already listening
    #[error("Server already active")]
    AlreadyActive,
}

/// Result type alias for lifecycle operations
pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    /// Check if this error is recoverable by simply trying again later
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::Endpoint(_) | Self::AlreadyActive => false,
        }
    }

    /// Check if this is a connection error
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Why a send did not reach the wire.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Client is idle or still connecting
    #[error("Not connected")]
    NotConnected,

    /// Server has no connection under this id (it may have just left)
    #[error("Unknown connection")]
    UnknownConnection,

    /// Payload exceeds the configured maximum message size
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// The socket's send buffer is exhausted; the connection was closed
    #[error("Send buffer full, connection closed")]
    Full,
}

/// Verdicts of the frame reader that end a connection.
#[derive(Error, Debug)]
pub enum FrameError {
    /// Header declared more bytes than `max_message_size` allows
    #[error("Declared message size {size} exceeds limit {max}")]
    Oversized { size: usize, max: usize },

    /// The stream failed or the peer closed it
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Check if the peer violated the framing protocol (as opposed to the
    /// socket simply going away).
    #[must_use]
    pub const fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::Oversized { .. })
    }
}
