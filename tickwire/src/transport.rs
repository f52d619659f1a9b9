//! One client and one server behind a single configuration.
//!
//! This is the surface a game engine integration drives: it owns both
//! roles, applies [`TransportConfig`] to each, and speaks `tcp4://` URIs.

use std::fmt;
use std::net::IpAddr;
use tickwire_core::config::TransportConfig;
use tickwire_core::endpoint::{format_uri, parse_uri, EndpointError};
use tickwire_core::error::{SendError, TransportError};
use tracing::info;

use crate::client::Client;
use crate::event::{ConnectionId, Event};
use crate::server::Server;

/// Client and server roles sharing one [`TransportConfig`].
#[derive(Debug)]
pub struct Transport {
    config: TransportConfig,
    client: Client,
    server: Server,
}

impl Transport {
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        let client = Client::new(config.client_options());
        let server = Server::new(config.server_options());
        info!("transport initialized (port {})", config.port);
        Self {
            config,
            client,
            server,
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn server(&mut self) -> &mut Server {
        &mut self.server
    }

    // client

    #[must_use]
    pub const fn client_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Connect to `host` on the configured port.
    pub fn client_connect(&mut self, host: &str) {
        self.client.connect(host, self.config.port);
    }

    /// Connect to a `tcp4://host[:port]` URI.
    ///
    /// The configured port applies when the URI has none.
    ///
    /// # Errors
    ///
    /// Returns an error, without connecting, if `uri` is malformed or uses
    /// another scheme.
    pub fn client_connect_uri(&mut self, uri: &str) -> Result<(), EndpointError> {
        let (host, port) = parse_uri(uri, self.config.port)?;
        self.client.connect(&host, port);
        Ok(())
    }

    /// Send one message to the server.
    ///
    /// # Errors
    ///
    /// See [`Client::send`].
    pub fn client_send(&mut self, payload: &[u8]) -> Result<(), SendError> {
        self.client.send(payload)
    }

    pub fn client_drain(&mut self, out: &mut Vec<Event>) {
        self.client.drain(out);
    }

    pub fn client_disconnect(&mut self) {
        self.client.disconnect();
    }

    // server

    /// `tcp4://` URI of the listening server, if any.
    ///
    /// Wildcard binds are reported as `localhost`.
    #[must_use]
    pub fn server_uri(&self) -> Option<String> {
        let addr = self.server.local_addr()?;
        let host = if addr.ip().is_unspecified() {
            "localhost".to_string()
        } else {
            addr.ip().to_string()
        };
        Some(format_uri(&host, addr.port()))
    }

    #[must_use]
    pub const fn server_active(&self) -> bool {
        self.server.is_active()
    }

    /// Listen on the configured port.
    ///
    /// # Errors
    ///
    /// See [`Server::start`].
    pub fn server_start(&mut self) -> Result<(), TransportError> {
        self.server.start(self.config.port)
    }

    /// Send one message to each of `ids`.
    ///
    /// Every id is attempted even after a failure.
    ///
    /// # Errors
    ///
    /// The first failure, if any.
    pub fn server_send_many(
        &mut self,
        ids: &[ConnectionId],
        payload: &[u8],
    ) -> Result<(), SendError> {
        let mut result = Ok(());
        for id in ids {
            let sent = self.server.send(*id, payload);
            if result.is_ok() {
                result = sent;
            }
        }
        result
    }

    /// Drain server events; does nothing while the server is inactive.
    pub fn server_drain(&mut self, out: &mut Vec<Event>) {
        if self.server.is_active() {
            self.server.drain(out);
        }
    }

    pub fn server_disconnect(&mut self, id: ConnectionId) -> bool {
        self.server.disconnect(id)
    }

    #[must_use]
    pub fn server_client_address(&self, id: ConnectionId) -> Option<IpAddr> {
        self.server.client_address(id).map(|addr| addr.ip())
    }

    pub fn server_stop(&mut self) {
        self.server.stop();
    }

    // common

    /// Largest message either side will send or accept from a client.
    #[must_use]
    pub const fn max_packet_size(&self) -> usize {
        self.config.server.max_message_size
    }

    pub fn shutdown(&mut self) {
        info!("transport shutdown");
        self.client.disconnect();
        self.server.stop();
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.server.is_active() {
            write!(f, "tickwire server port: {}", self.config.port)
        } else if self.client.is_connecting() || self.client.is_connected() {
            write!(f, "tickwire client port: {}", self.config.port)
        } else {
            write!(f, "tickwire (inactive/disconnected)")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickwire_core::options::TransportOptions;

    #[test]
    fn test_roles_configured_from_config() {
        let config = TransportConfig::new()
            .with_no_delay(false)
            .with_server_options(TransportOptions::server().with_max_message_size(1024));
        let mut transport = Transport::new(config);

        assert_eq!(transport.max_packet_size(), 1024);
        assert_eq!(transport.server().options().max_message_size, 1024);
        assert!(!transport.server().options().no_delay);
        assert!(!transport.client().options().no_delay);
        assert_eq!(transport.client().options().max_receives_per_tick, 1000);
    }

    #[test]
    fn test_inactive_status() {
        let transport = Transport::default();
        assert!(!transport.server_active());
        assert!(!transport.client_connected());
        assert_eq!(transport.server_uri(), None);
        assert_eq!(transport.to_string(), "tickwire (inactive/disconnected)");
    }

    #[test]
    fn test_connect_uri_rejects_other_scheme() {
        let mut transport = Transport::default();
        assert!(matches!(
            transport.client_connect_uri("http://example.com:80"),
            Err(EndpointError::InvalidScheme(_))
        ));
        assert!(!transport.client().is_connecting());
    }

    #[test]
    fn test_server_start_and_status() {
        let mut transport = Transport::new(TransportConfig::new().with_port(0));
        transport.server_start().unwrap();
        assert!(transport.server_active());
        assert_eq!(transport.to_string(), "tickwire server port: 0");

        let uri = transport.server_uri().unwrap();
        assert!(uri.starts_with("tcp4://localhost:"));

        assert!(matches!(
            transport.server_start(),
            Err(TransportError::AlreadyActive)
        ));

        transport.shutdown();
        assert!(!transport.server_active());
    }

    #[test]
    fn test_send_many_unknown_ids() {
        let mut transport = Transport::default();
        assert_eq!(
            transport.server_send_many(&[ConnectionId(1), ConnectionId(2)], b"x"),
            Err(SendError::UnknownConnection)
        );
        assert!(transport.server_send_many(&[], b"x").is_ok());
    }
}
