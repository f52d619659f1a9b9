//! # Tickwire
//!
//! A message-framed TCP transport for real-time multiplayer games: many
//! small, frequent messages, little added latency, and a receiver that a
//! flooding peer cannot exhaust.
//!
//! ## Model
//!
//! - **Framing**: every message is `[u32 big-endian length][payload]`
//! - **Ticks**: the game loop calls `drain` once per tick; nothing runs in
//!   between and nothing blocks
//! - **Bounded reads**: at most `max_receives_per_tick` messages per
//!   connection per tick, from pre-allocated buffers
//! - **Backpressure**: multi-megabyte kernel buffers instead of send
//!   queues; a send that does not fit closes the connection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tickwire::{Client, Event, Server, TransportOptions};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = Server::new(TransportOptions::server());
//! server.start(7777)?;
//!
//! let mut client = Client::new(TransportOptions::client());
//! client.connect("127.0.0.1", 7777);
//!
//! let mut events = Vec::new();
//! loop {
//!     events.clear();
//!     client.drain(&mut events);
//!     if events.iter().any(|e| matches!(e, Event::Connected { .. })) {
//!         client.send(b"hello")?;
//!     }
//!
//!     events.clear();
//!     server.drain(&mut events);
//!     for event in &events {
//!         match event {
//!             Event::Connected { id } => println!("{id} joined"),
//!             Event::Data { id, payload } => println!("{id}: {payload:?}"),
//!             Event::Disconnected { id } => println!("{id} left"),
//!         }
//!     }
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Events
//!
//! Per connection: one `Connected`, any number of `Data`, then one
//! `Disconnected`. A `Data` payload views the connection's receive buffer;
//! drop or copy it before the next `drain`.

#![warn(clippy::all)]

pub mod client;
pub mod connection;
pub mod dev_tracing;
pub mod event;
pub mod server;
pub mod transport;

pub use bytes::Bytes;

pub use client::Client;
pub use event::{ConnectionId, Event};
pub use server::Server;
pub use transport::Transport;

pub use tickwire_core::config::{TransportConfig, DEFAULT_PORT};
pub use tickwire_core::endpoint::{Endpoint, EndpointError};
pub use tickwire_core::error::{SendError, TransportError};
pub use tickwire_core::options::TransportOptions;

/// Common imports.
pub mod prelude {
    pub use crate::{
        Bytes, Client, ConnectionId, Event, SendError, Server, Transport, TransportConfig,
        TransportError, TransportOptions,
    };
}
