//! Network side of the sinkhole.
//!
//! A UDP transport receives client queries and sends replies, and a UDP
//! upstream carries each hop of an iterative resolution. Hostnames of root
//! and authority servers go through the system resolver.

pub mod udp;

use std::io;
use std::net::IpAddr;

use crate::resolver::HostLookup;

/// Largest datagram read from clients or upstream servers.
pub const MAX_DNS_PACKET_SIZE: usize = 1024;

/// Looks hostnames up through the operating system's resolver.
///
/// IPv4 addresses are preferred when a name has both kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> io::Result<IpAddr> {
        let addrs: Vec<IpAddr> = tokio::net::lookup_host((host, 0))
            .await?
            .map(|addr| addr.ip())
            .collect();

        addrs
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
            })
    }
}
