//! TCP socket setup.
//!
//! Listener and outbound sockets are built with `socket2` so that
//! dual-stack binding, address reuse, kernel buffer sizes, TCP_NODELAY and
//! keepalive are set before the socket is handed to `std::net`.
//!
//! Option failures are logged and skipped: a socket with a smaller buffer
//! than requested still works.

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;
use tracing::{debug, error};

use crate::options::TransportOptions;

/// Pending-connection queue length for listeners.
pub const LISTEN_BACKLOG: i32 = 1024;

/// Apply `options` to a socket: non-blocking mode, kernel buffer sizes,
/// TCP_NODELAY and keepalive.
///
/// Each failure is logged and the remaining options are still applied.
pub fn configure_socket(socket: &Socket, options: &TransportOptions) {
    if let Err(e) = socket.set_nonblocking(true) {
        error!("failed to set non-blocking mode: {}", e);
    }
    if let Err(e) = socket.set_send_buffer_size(options.send_buffer_size) {
        error!(
            "failed to set send buffer size to {}: {}",
            options.send_buffer_size, e
        );
    }
    if let Err(e) = socket.set_recv_buffer_size(options.recv_buffer_size) {
        error!(
            "failed to set receive buffer size to {}: {}",
            options.recv_buffer_size, e
        );
    }
    if let Err(e) = socket.set_nodelay(options.no_delay) {
        error!("failed to set TCP_NODELAY={}: {}", options.no_delay, e);
    }
    if let Err(e) = socket.set_keepalive(options.keepalive) {
        error!("failed to set SO_KEEPALIVE={}: {}", options.keepalive, e);
    }
}

/// [`configure_socket`] for an already-built `std` stream, such as one
/// returned by `accept`.
pub fn configure_stream(stream: &TcpStream, options: &TransportOptions) {
    configure_socket(&SockRef::from(stream), options);
}

/// Bind a non-blocking listener on every interface.
///
/// Tries an IPv6 socket that also accepts IPv4 (dual-stack) first, and
/// falls back to IPv4 only where IPv6 is unavailable.
///
/// # Errors
///
/// Returns the IPv4 error if both attempts fail.
pub fn listen(port: u16, options: &TransportOptions) -> io::Result<TcpListener> {
    match bind_listener(SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)), options) {
        Ok(listener) => Ok(listener),
        Err(e) => {
            debug!("dual-stack listen on port {} failed ({}), using IPv4", port, e);
            bind_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)), options)
        }
    }
}

fn bind_listener(addr: SocketAddr, options: &TransportOptions) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    // rebinding right after a restart must not hit TIME_WAIT
    socket.set_reuse_address(true)?;
    // accepted sockets inherit buffer sizes from the listener
    configure_socket(&socket, options);
    socket.bind(&SockAddr::from(addr))?;
    socket.listen(LISTEN_BACKLOG)?;
    socket.set_nonblocking(true)?;
    Ok(TcpListener::from(socket))
}

/// Create an unconnected, blocking TCP socket matching `addr`'s family.
///
/// Options are applied with [`configure_socket`] once the connect has
/// succeeded.
pub fn new_socket_for(addr: &SocketAddr) -> io::Result<Socket> {
    Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))
}

/// Blocking connect.
///
/// A zero `timeout` leaves the deadline to the operating system.
pub fn connect(socket: &Socket, addr: &SocketAddr, timeout: Duration) -> io::Result<()> {
    let addr = SockAddr::from(*addr);
    if timeout.is_zero() {
        socket.connect(&addr)
    } else {
        socket.connect_timeout(&addr, timeout)
    }
}

/// Turn a connected socket into a non-blocking `std` stream.
pub fn into_stream(socket: Socket) -> io::Result<TcpStream> {
    socket.set_nonblocking(true)?;
    Ok(TcpStream::from(socket))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(port: u16) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, port))
    }

    #[test]
    fn test_listen_ephemeral_port() {
        let listener = listen(0, &TransportOptions::server()).unwrap();
        let addr = listener.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_unspecified());
    }

    #[test]
    fn test_listener_is_non_blocking() {
        let listener = listen(0, &TransportOptions::server()).unwrap();
        let err = listener.accept().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_ipv4_client_reaches_listener() {
        let options = TransportOptions::server().with_no_delay(true);
        let listener = listen(0, &options).unwrap();
        let port = listener.local_addr().unwrap().port();

        let socket = new_socket_for(&local(port)).unwrap();
        connect(&socket, &local(port), Duration::from_secs(5)).unwrap();
        configure_socket(&socket, &options);
        let stream = into_stream(socket).unwrap();

        assert!(SockRef::from(&stream).nodelay().unwrap());
        assert_eq!(stream.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn test_configure_accepted_stream() {
        let options = TransportOptions::server();
        let listener = listen(0, &options).unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = TcpStream::connect(local(port)).unwrap();

        let accepted = loop {
            match listener.accept() {
                Ok((stream, _)) => break stream,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("accept failed: {e}"),
            }
        };

        configure_stream(&accepted, &options.clone().with_no_delay(true));
        let sock = SockRef::from(&accepted);
        assert!(sock.nodelay().unwrap());
        assert!(sock.keepalive().unwrap());
        drop(client);
    }

    #[test]
    fn test_connect_refused() {
        // bind then drop to find a port with nothing listening
        let port = {
            let listener = std::net::TcpListener::bind(local(0)).unwrap();
            listener.local_addr().unwrap().port()
        };
        let socket = new_socket_for(&local(port)).unwrap();
        let err = connect(&socket, &local(port), Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }
}
