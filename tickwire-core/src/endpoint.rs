//! Network endpoint values and `tcp4://` address parsing.
//!
//! An [`Endpoint`] is the immutable address handed to the sockets layer:
//! address family, raw address bytes and a host-order port. Two endpoints
//! are equal only when family, length, bytes and port all match.

use smallvec::SmallVec;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs};

/// URI scheme for this transport: TCP with a 4 byte length header.
pub const SCHEME: &str = "tcp4";

/// Address family of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Length of the raw address for this family.
    #[must_use]
    pub const fn address_len(self) -> usize {
        match self {
            Self::V4 => 4,
            Self::V6 => 16,
        }
    }
}

/// Transport endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    family: AddressFamily,
    address: SmallVec<[u8; 16]>,
    port: u16,
}

impl Endpoint {
    /// IPv4 endpoint from raw address bytes.
    #[must_use]
    pub fn ipv4(octets: [u8; 4], port: u16) -> Self {
        Self {
            family: AddressFamily::V4,
            address: SmallVec::from_slice(&octets),
            port,
        }
    }

    /// IPv6 endpoint from raw address bytes.
    #[must_use]
    pub fn ipv6(octets: [u8; 16], port: u16) -> Self {
        Self {
            family: AddressFamily::V6,
            address: SmallVec::from_slice(&octets),
            port,
        }
    }

    /// The IPv6 wildcard (`[::]:port`), used for dual-stack listeners.
    #[must_use]
    pub fn ipv6_any(port: u16) -> Self {
        Self::ipv6(Ipv6Addr::UNSPECIFIED.octets(), port)
    }

    /// The IPv4 wildcard (`0.0.0.0:port`).
    #[must_use]
    pub fn ipv4_any(port: u16) -> Self {
        Self::ipv4(Ipv4Addr::UNSPECIFIED.octets(), port)
    }

    /// Resolve a host name or literal address to its first endpoint.
    ///
    /// May block briefly on DNS.
    ///
    /// # Examples
    ///
    /// ```
    /// use tickwire_core::endpoint::{AddressFamily, Endpoint};
    ///
    /// let endpoint = Endpoint::resolve("127.0.0.1", 7777).unwrap();
    /// assert_eq!(endpoint.family(), AddressFamily::V4);
    /// assert_eq!(endpoint.port(), 7777);
    /// ```
    pub fn resolve(host: &str, port: u16) -> Result<Self, EndpointError> {
        let mut addrs = (host, port)
            .to_socket_addrs()
            .map_err(|source| EndpointError::Resolve {
                host: host.to_string(),
                source,
            })?;
        addrs
            .next()
            .map(Self::from)
            .ok_or_else(|| EndpointError::NoAddress(host.to_string()))
    }

    #[inline]
    #[must_use]
    pub const fn family(&self) -> AddressFamily {
        self.family
    }

    /// Raw address bytes (4 for IPv4, 16 for IPv6).
    #[inline]
    #[must_use]
    pub fn address_bytes(&self) -> &[u8] {
        &self.address
    }

    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// The address as an `IpAddr`.
    #[must_use]
    pub fn ip(&self) -> IpAddr {
        match self.family {
            AddressFamily::V4 => {
                let mut octets = [0u8; 4];
                octets.copy_from_slice(&self.address);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            AddressFamily::V6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&self.address);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        }
    }

    /// Split into printable address and port.
    #[must_use]
    pub fn format(&self) -> (String, u16) {
        (self.ip().to_string(), self.port)
    }

    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip(), self.port)
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::ipv4(v4.ip().octets(), v4.port()),
            SocketAddr::V6(v6) => Self::ipv6(v6.ip().octets(), v6.port()),
        }
    }
}

impl From<&Endpoint> for SocketAddr {
    fn from(endpoint: &Endpoint) -> Self {
        endpoint.socket_addr()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

/// Parse `tcp4://host[:port]` into host and port.
///
/// Bracketed IPv6 literals are unwrapped. `default_port` is used when the
/// URI carries none. Anything after the authority is ignored.
///
/// # Examples
///
/// ```
/// use tickwire_core::endpoint::parse_uri;
///
/// assert_eq!(parse_uri("tcp4://example.com:9000", 7777).unwrap(), ("example.com".to_string(), 9000));
/// assert_eq!(parse_uri("tcp4://[::1]", 7777).unwrap(), ("::1".to_string(), 7777));
/// ```
pub fn parse_uri(uri: &str, default_port: u16) -> Result<(String, u16), EndpointError> {
    let rest = uri
        .strip_prefix(SCHEME)
        .and_then(|r| r.strip_prefix("://"))
        .ok_or_else(|| EndpointError::InvalidScheme(uri.to_string()))?;

    let authority = rest
        .split(|c: char| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();

    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, tail) = bracketed
            .split_once(']')
            .ok_or_else(|| EndpointError::InvalidHost(uri.to_string()))?;
        let port = match tail {
            "" => None,
            t => Some(
                t.strip_prefix(':')
                    .ok_or_else(|| EndpointError::InvalidHost(uri.to_string()))?,
            ),
        };
        (host, port)
    } else {
        match authority.split_once(':') {
            Some((host, port)) if !port.contains(':') => (host, Some(port)),
            // bare IPv6 literal without brackets
            Some(_) => (authority, None),
            None => (authority, None),
        }
    };

    if host.is_empty() {
        return Err(EndpointError::InvalidHost(uri.to_string()));
    }

    let port = match port {
        Some(p) => p
            .parse::<u16>()
            .map_err(|_| EndpointError::InvalidPort(p.to_string()))?,
        None => default_port,
    };

    Ok((host.to_string(), port))
}

/// Build a `tcp4://host:port` URI.
#[must_use]
pub fn format_uri(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("{SCHEME}://[{host}]:{port}")
    } else {
        format!("{SCHEME}://{host}:{port}")
    }
}

/// Errors that can occur when parsing or resolving endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid scheme in uri: {0} (expected tcp4://)")]
    InvalidScheme(String),

    #[error("Invalid host in uri: {0}")]
    InvalidHost(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Failed to resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("No address found for host: {0}")]
    NoAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ipv4_literal() {
        let endpoint = Endpoint::resolve("127.0.0.1", 5555).unwrap();
        assert_eq!(endpoint.family(), AddressFamily::V4);
        assert_eq!(endpoint.address_bytes(), &[127, 0, 0, 1]);
        assert_eq!(endpoint.to_string(), "127.0.0.1:5555");
    }

    #[test]
    fn test_resolve_ipv6_literal() {
        let endpoint = Endpoint::resolve("::1", 5555).unwrap();
        assert_eq!(endpoint.family(), AddressFamily::V6);
        assert_eq!(endpoint.address_bytes().len(), 16);
        assert_eq!(endpoint.to_string(), "[::1]:5555");
    }

    #[test]
    fn test_resolve_failure() {
        let result = Endpoint::resolve("definitely not a host name", 5555);
        assert!(result.is_err());
    }

    #[test]
    fn test_equality_is_byte_exact() {
        let v4 = Endpoint::ipv4([127, 0, 0, 1], 7777);
        let mapped = Endpoint::from("[::ffff:127.0.0.1]:7777".parse::<SocketAddr>().unwrap());
        assert_ne!(v4, mapped);
        assert_eq!(v4, Endpoint::from("127.0.0.1:7777".parse::<SocketAddr>().unwrap()));
        assert_ne!(v4, Endpoint::ipv4([127, 0, 0, 1], 7778));
    }

    #[test]
    fn test_format_round_trip() {
        let endpoint = Endpoint::ipv6_any(7777);
        let (address, port) = endpoint.format();
        assert_eq!(address, "::");
        assert_eq!(port, 7777);
        assert_eq!(Endpoint::from(endpoint.socket_addr()), endpoint);
    }

    #[test]
    fn test_parse_uri_with_port() {
        assert_eq!(
            parse_uri("tcp4://127.0.0.1:9000", 7777).unwrap(),
            ("127.0.0.1".to_string(), 9000)
        );
    }

    #[test]
    fn test_parse_uri_default_port() {
        assert_eq!(
            parse_uri("tcp4://localhost", 7777).unwrap(),
            ("localhost".to_string(), 7777)
        );
        assert_eq!(
            parse_uri("tcp4://localhost/lobby", 7777).unwrap(),
            ("localhost".to_string(), 7777)
        );
    }

    #[test]
    fn test_parse_uri_ipv6() {
        assert_eq!(
            parse_uri("tcp4://[::1]:9000", 7777).unwrap(),
            ("::1".to_string(), 9000)
        );
    }

    #[test]
    fn test_parse_uri_invalid_scheme() {
        let result = parse_uri("http://127.0.0.1:9000", 7777);
        assert!(matches!(result, Err(EndpointError::InvalidScheme(_))));
    }

    #[test]
    fn test_parse_uri_invalid_port() {
        let result = parse_uri("tcp4://127.0.0.1:70000", 7777);
        assert!(matches!(result, Err(EndpointError::InvalidPort(_))));
    }

    #[test]
    fn test_parse_uri_empty_host() {
        let result = parse_uri("tcp4://:9000", 7777);
        assert!(matches!(result, Err(EndpointError::InvalidHost(_))));
    }

    #[test]
    fn test_format_uri() {
        assert_eq!(format_uri("example.com", 7777), "tcp4://example.com:7777");
        assert_eq!(format_uri("::1", 7777), "tcp4://[::1]:7777");
    }
}
