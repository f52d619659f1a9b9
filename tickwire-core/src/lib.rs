//! Tickwire Core
//!
//! This crate contains the transport-agnostic building blocks:
//! - Network addressing and `tcp4://` parsing (`endpoint`)
//! - Per-socket policy and per-role configuration (`options`, `config`)
//! - The sockets capability seam and the open/closed socket slot (`stream`)
//! - `socket2`-backed socket setup: configure, listen, connect (`tcp`)
//! - Exact-size reads and all-or-nothing writes (`framed`)
//! - The length-prefix frame reader state machine (`codec`)
//! - Pre-allocated content buffers (`buffer`)
//! - Error types (`error`)

#![cfg_attr(not(test), deny(unsafe_code))]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
pub mod buffer;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod framed;
pub mod options;
pub mod stream;
pub mod tcp;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::buffer::BufferRing;
    pub use crate::codec::{FrameReader, Phase, HEADER_LEN};
    pub use crate::config::TransportConfig;
    pub use crate::endpoint::{AddressFamily, Endpoint, EndpointError};
    pub use crate::error::{FrameError, SendError, TransportError};
    pub use crate::framed::{read_exact_if_available, FrameWriter};
    pub use crate::options::TransportOptions;
    pub use crate::stream::{SocketSlot, Stream};
}
