//! Network transports for record playback.
//!
//! Each stream owns exactly one transport for its whole lifetime. TCP keeps
//! a persistent client connection from `open` to `close`; the UDP variants
//! hold an unconnected socket and address every datagram at send time.

use crate::error::{Error, Result};
use std::io::Write;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};

/// Where a stream's records are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Persistent TCP client connection
    Tcp { host: String, port: u16 },
    /// UDP datagrams to a broadcast address
    UdpBroadcast { addr: String, port: u16 },
    /// UDP datagrams to a single host
    UdpUnicast { addr: String, port: u16 },
}

impl Target {
    /// True for datagram targets, where individual send failures are
    /// tolerated rather than stream-fatal.
    pub fn is_datagram(&self) -> bool {
        !matches!(self, Target::Tcp { .. })
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Target::UdpBroadcast { addr, port } => write!(f, "udp-broadcast://{}:{}", addr, port),
            Target::UdpUnicast { addr, port } => write!(f, "udp://{}:{}", addr, port),
        }
    }
}

/// Transport for one playback stream.
///
/// `open` establishes the connection or socket, `send` transmits one encoded
/// record, `close` releases the socket. `close` is idempotent and also runs
/// on drop, so the socket is released on every exit path.
pub trait Transport: Send {
    /// Establish the connection or bind the socket
    fn open(&mut self) -> Result<()>;

    /// Transmit one encoded record
    fn send(&mut self, payload: &[u8]) -> Result<()>;

    /// Release the socket. Safe to call more than once.
    fn close(&mut self);

    /// The target this transport delivers to
    fn target(&self) -> &Target;
}

/// Create the transport for a target
pub fn create_transport(target: &Target) -> Box<dyn Transport> {
    match target {
        Target::Tcp { .. } => Box::new(TcpTransport::new(target.clone())),
        Target::UdpBroadcast { .. } | Target::UdpUnicast { .. } => {
            Box::new(UdpTransport::new(target.clone()))
        }
    }
}

fn not_open(target: &Target) -> Error {
    Error::Send {
        target: target.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotConnected, "transport not open"),
    }
}

fn resolve(addr: &str, port: u16) -> std::io::Result<SocketAddr> {
    (addr, port).to_socket_addrs()?.next().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved")
    })
}

// ============================================================================
// TCP
// ============================================================================

struct TcpTransport {
    target: Target,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    fn new(target: Target) -> Self {
        Self {
            target,
            stream: None,
        }
    }
}

impl Transport for TcpTransport {
    fn open(&mut self) -> Result<()> {
        let Target::Tcp { host, port } = &self.target else {
            return Err(Error::Config(format!("not a TCP target: {}", self.target)));
        };
        let stream = TcpStream::connect((host.as_str(), *port)).map_err(|e| Error::Connection {
            target: self.target.to_string(),
            source: e,
        })?;
        self.stream = Some(stream);
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(not_open(&self.target));
        };
        stream.write_all(payload).map_err(|e| Error::Send {
            target: self.target.to_string(),
            source: e,
        })
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    fn target(&self) -> &Target {
        &self.target
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// UDP (broadcast and unicast)
// ============================================================================

struct UdpTransport {
    target: Target,
    socket: Option<UdpSocket>,
    dest: Option<SocketAddr>,
}

impl UdpTransport {
    fn new(target: Target) -> Self {
        Self {
            target,
            socket: None,
            dest: None,
        }
    }
}

impl Transport for UdpTransport {
    fn open(&mut self) -> Result<()> {
        let (addr, port, broadcast) = match &self.target {
            Target::UdpBroadcast { addr, port } => (addr.as_str(), *port, true),
            Target::UdpUnicast { addr, port } => (addr.as_str(), *port, false),
            Target::Tcp { .. } => {
                return Err(Error::Config(format!("not a UDP target: {}", self.target)));
            }
        };
        let connect_err = |e| Error::Connection {
            target: self.target.to_string(),
            source: e,
        };

        // Bind to any available port; this socket only sends
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(connect_err)?;
        if broadcast {
            socket.set_broadcast(true).map_err(connect_err)?;
        }
        let dest = resolve(addr, port).map_err(connect_err)?;

        self.socket = Some(socket);
        self.dest = Some(dest);
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        let (Some(socket), Some(dest)) = (self.socket.as_ref(), self.dest) else {
            return Err(not_open(&self.target));
        };
        socket.send_to(payload, dest).map_err(|e| Error::Send {
            target: self.target.to_string(),
            source: e,
        })?;
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
        self.dest = None;
    }

    fn target(&self) -> &Target {
        &self.target
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        self.close();
    }
}
