use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::actuator::Actuator;
use crate::dispatch::{Flow, Shutter};
use crate::error::ServeError;
use crate::store::ByteStore;

/// Datagram transport to and from the master.
pub trait Transport {
    /// Poll for one datagram. `Ok(None)` when nothing is pending.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>>;

    fn send_to(&mut self, data: &[u8], to: SocketAddrV4) -> io::Result<()>;
}

/// UDP socket with a short read timeout, so polling yields the CPU.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Listen on `port` on all interfaces.
    pub fn bind(port: u16, poll_timeout: Duration) -> io::Result<Self> {
        Self::bind_addr(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port), poll_timeout)
    }

    pub fn bind_addr(addr: SocketAddrV4, poll_timeout: Duration) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(poll_timeout))?;
        info!("Listening on {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        match self.socket.recv_from(buf) {
            Ok((n, _from)) => Ok(Some(n)),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn send_to(&mut self, data: &[u8], to: SocketAddrV4) -> io::Result<()> {
        self.socket.send_to(data, to).map(|_| ())
    }
}

/// One turn of the serve loop: poll, dispatch to completion, reply.
///
/// Replies always go to the master address in the current identity. A
/// failed send is logged and does not stop the loop.
pub fn serve_once<S, A, D, T>(
    shutter: &mut Shutter<S, A, D>,
    transport: &mut T,
    buf: &mut [u8],
) -> Result<Flow, ServeError>
where
    S: ByteStore,
    A: Actuator,
    D: DelayNs,
    T: Transport,
{
    let len = match transport.recv(buf).map_err(ServeError::Transport)? {
        Some(n) => n,
        None => return Ok(Flow::Continue),
    };

    let outcome = shutter.dispatch(&buf[..len])?;

    if let Some(reply) = outcome.reply {
        let to = shutter.master_addr();
        match reply.encode_to_vec() {
            Ok(bytes) => {
                if let Err(e) = transport.send_to(&bytes, to) {
                    warn!("Reply {} to {} failed: {}", reply.address(), to, e);
                }
            }
            Err(e) => warn!("Could not encode {}: {}", reply.address(), e),
        }
    }

    Ok(outcome.flow)
}
