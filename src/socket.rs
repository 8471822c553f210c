//! Datagram endpoint (§4.B): a thin, blocking wrapper over a UDP socket.
//!
//! Built via `socket2` (mirrors the bind-then-convert-to-std idiom this
//! codebase's teacher uses for its own transfer sockets) and then driven
//! with ordinary blocking `recv_from`/`send_to` plus `SO_RCVTIMEO` — no
//! async runtime. §5 of the protocol spec requires single-threaded,
//! synchronous, blocking I/O.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::error::Result;

/// A bound UDP socket used for one peer's worth of traffic. The server
/// binds once on the well-known port and reuses the same endpoint for
/// every request (§9: no TID renegotiation); the client binds an
/// ephemeral port per invocation.
pub struct DatagramEndpoint {
    socket: UdpSocket,
}

impl DatagramEndpoint {
    /// Bind `0.0.0.0:port` (server-side; `port = 0` picks an ephemeral
    /// port for client-side use).
    pub fn bind(port: u16) -> Result<Self> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_reuse_address(true)?;
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        raw.bind(&addr.into())?;
        let socket: UdpSocket = raw.into();
        Ok(DatagramEndpoint { socket })
    }

    /// Send `bytes` to `peer`, blocking until the kernel accepts the
    /// datagram.
    pub fn send(&self, bytes: &[u8], peer: SocketAddr) -> Result<usize> {
        Ok(self.socket.send_to(bytes, peer)?)
    }

    /// Receive one datagram into `buf`, blocking up to the endpoint's
    /// configured timeout (see `set_recv_timeout`). Returns the number of
    /// bytes received and the sender's address. A timeout surfaces as
    /// `io::ErrorKind::WouldBlock`/`TimedOut`, which callers translate to
    /// `TftpError::Timeout`.
    pub fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        Ok(self.socket.recv_from(buf)?)
    }

    /// Set `SO_RCVTIMEO`. `None` disables the timeout (blocks forever) —
    /// this is the dispatcher's idle-waiting-for-a-request state; a
    /// `Some(duration)` is the per-block deadline used once a transfer is
    /// under way.
    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.socket.set_read_timeout(timeout)?)
    }

    /// The local address this endpoint is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}
