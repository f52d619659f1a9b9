//! Transport events.
//!
//! `drain` appends these to a caller-owned `Vec<Event>`; there are no
//! callbacks.

use bytes::Bytes;
use std::fmt;

/// Stable identifier of one connection.
///
/// Servers hand out ids from 1 upwards and never reuse them. The client's
/// single connection is always [`ConnectionId::LOCAL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    /// Identity of the client's own connection.
    pub const LOCAL: Self = Self(0);

    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ConnectionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Connection lifecycle and data events.
///
/// Per connection, `Connected` comes first and `Disconnected` last; nothing
/// follows `Disconnected` for an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connected { id: ConnectionId },

    /// One whole message.
    ///
    /// `payload` views the connection's receive buffer. Drop or copy it
    /// before the next `drain` so the buffer can be recycled in place.
    Data { id: ConnectionId, payload: Bytes },

    Disconnected { id: ConnectionId },
}

impl Event {
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        match self {
            Self::Connected { id } | Self::Data { id, .. } | Self::Disconnected { id } => *id,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { id } => write!(f, "Connected({id})"),
            Self::Data { id, payload } => write!(f, "Data({id}, {} bytes)", payload.len()),
            Self::Disconnected { id } => write!(f, "Disconnected({id})"),
        }
    }
}
