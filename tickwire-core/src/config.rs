//! Transport configuration surface
//!
//! One port, one Nagle switch, and separately tuned framing limits for the
//! server role and the client role.

use crate::options::TransportOptions;

/// Default listen / connect port.
pub const DEFAULT_PORT: u16 = 7777;

/// Configuration for a transport that can act as client, server, or both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Port the server listens on and the client connects to by default
    pub port: u16,
    /// TCP_NODELAY for both roles
    pub no_delay: bool,
    /// Options for accepted connections
    pub server: TransportOptions,
    /// Options for the outbound connection
    pub client: TransportOptions,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            no_delay: true,
            server: TransportOptions::server().with_max_receives_per_tick(100),
            client: TransportOptions::client(),
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    #[must_use]
    pub fn with_server_options(mut self, options: TransportOptions) -> Self {
        self.server = options;
        self
    }

    #[must_use]
    pub fn with_client_options(mut self, options: TransportOptions) -> Self {
        self.client = options;
        self
    }

    /// Server options with the shared `no_delay` switch applied.
    #[must_use]
    pub fn server_options(&self) -> TransportOptions {
        self.server.clone().with_no_delay(self.no_delay)
    }

    /// Client options with the shared `no_delay` switch applied.
    #[must_use]
    pub fn client_options(&self) -> TransportOptions {
        self.client.clone().with_no_delay(self.no_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TransportConfig::default();
        assert_eq!(config.port, 7777);
        assert!(config.no_delay);
        assert_eq!(config.server.max_message_size, 16 * 1024);
        assert_eq!(config.server.max_receives_per_tick, 100);
        assert_eq!(config.client.max_receives_per_tick, 1000);
    }

    #[test]
    fn test_no_delay_applied_to_roles() {
        let config = TransportConfig::new().with_no_delay(false).with_server_options(
            TransportOptions::server().with_no_delay(true),
        );
        assert!(!config.server_options().no_delay);
        assert!(!config.client_options().no_delay);
    }

    #[test]
    fn test_roles_tuned_separately() {
        let config = TransportConfig::new()
            .with_port(9000)
            .with_server_options(TransportOptions::server().with_max_message_size(1024))
            .with_client_options(TransportOptions::client().with_max_message_size(4096));
        assert_eq!(config.port, 9000);
        assert_eq!(config.server_options().max_message_size, 1024);
        assert_eq!(config.client_options().max_message_size, 4096);
    }
}
