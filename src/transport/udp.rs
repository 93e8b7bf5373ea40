//! UDP transport for DNS queries.
//!
//! The listening side receives client queries and hands each one to its own
//! local task, so a slow resolution chain never holds up other clients.
//! Upstream hops each get a fresh socket connected to the server being
//! asked: replies from anywhere else are dropped by the kernel and
//! concurrent chains can't see each other's traffic.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::rc::Rc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{trace, warn};

use crate::resolver::{HostLookup, Upstream};
use crate::server::Sinkhole;

use super::MAX_DNS_PACKET_SIZE;

/// UDP listener for the sinkhole.
pub struct UdpTransport {
    socket: Rc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Rc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Start the UDP transport.
    ///
    /// Spawns the receive loop on the current `LocalSet`.
    pub fn start<U, L>(self, sinkhole: Rc<Sinkhole<U, L>>)
    where
        U: Upstream + 'static,
        L: HostLookup + 'static,
    {
        tokio::task::spawn_local(run(self.socket, sinkhole));
    }
}

/// Receive loop: one spawned task per client datagram.
async fn run<U, L>(socket: Rc<UdpSocket>, sinkhole: Rc<Sinkhole<U, L>>)
where
    U: Upstream + 'static,
    L: HostLookup + 'static,
{
    let mut buf = [0u8; MAX_DNS_PACKET_SIZE];

    loop {
        let (len, src) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "UDP recv error");
                continue;
            }
        };

        trace!(client = %src, len, "received query");
        let query = buf[..len].to_vec();
        let socket = socket.clone();
        let sinkhole = sinkhole.clone();

        tokio::task::spawn_local(async move {
            let Some(response) = sinkhole.answer(&query).await else {
                return;
            };

            if let Err(e) = socket.send_to(&response, src).await {
                warn!(client = %src, error = %e, "UDP response error");
            }
        });
    }
}

/// Wait for one upstream reply before giving up on the hop.
///
/// Each client query runs in its own task, so a reply that never arrives
/// would otherwise pin that task and its socket for good.
pub const DEFAULT_HOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends each hop from its own ephemeral UDP socket.
#[derive(Debug, Clone)]
pub struct UdpUpstream {
    timeout: Option<Duration>,
}

impl UdpUpstream {
    /// `timeout` bounds the wait for each reply; `None` waits forever.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for UdpUpstream {
    fn default() -> Self {
        Self::new(Some(DEFAULT_HOP_TIMEOUT))
    }
}

impl Upstream for UdpUpstream {
    async fn exchange(&self, query: &[u8], addr: SocketAddr) -> io::Result<Vec<u8>> {
        let local: SocketAddr = match addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(addr).await?;
        socket.send(query).await?;

        let mut buf = vec![0u8; MAX_DNS_PACKET_SIZE];
        let len = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, socket.recv(&mut buf))
                .await
                .map_err(|_| {
                    io::Error::new(io::ErrorKind::TimedOut, format!("no reply from {addr}"))
                })??,
            None => socket.recv(&mut buf).await?,
        };
        buf.truncate(len);

        Ok(buf)
    }
}
