//! Packet builders and in-memory upstreams for unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{IpAddr, SocketAddr};

use crate::resolver::{HostLookup, Upstream};

pub fn encode_name(buf: &mut Vec<u8>, name: &str) {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0);
}

/// A standard recursive A query.
pub fn query(id: u16, domain: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(512);

    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&[0x01, 0x00]); // Flags: RD
    packet.extend_from_slice(&[0x00, 0x01]); // Questions: 1
    packet.extend_from_slice(&[0x00, 0x00]); // Answer RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Authority RRs: 0
    packet.extend_from_slice(&[0x00, 0x00]); // Additional RRs: 0

    encode_name(&mut packet, domain);
    packet.extend_from_slice(&[0x00, 0x01]); // Type: A
    packet.extend_from_slice(&[0x00, 0x01]); // Class: IN

    packet
}

/// An authoritative response with `answers` A records, one NS record per
/// entry in `authorities`, and a single 16 byte glue record.
pub fn response(id: u16, domain: &str, rcode: u8, answers: u16, authorities: &[&str]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(512);

    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&[0x84, rcode]); // QR, AA
    packet.extend_from_slice(&[0x00, 0x01]);
    packet.extend_from_slice(&answers.to_be_bytes());
    packet.extend_from_slice(&(authorities.len() as u16).to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x01]);

    encode_name(&mut packet, domain);
    packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

    for _ in 0..answers {
        packet.extend_from_slice(&[0xc0, 0x0c]); // Name pointer
        packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        packet.extend_from_slice(&[0x00, 0x00, 0x01, 0x2c]); // TTL: 300
        packet.extend_from_slice(&[0x00, 0x04]);
        packet.extend_from_slice(&[93, 184, 216, 34]);
    }

    for server in authorities {
        let mut rdata = Vec::new();
        encode_name(&mut rdata, server);

        packet.extend_from_slice(&[0xc0, 0x0c]);
        packet.extend_from_slice(&[0x00, 0x02, 0x00, 0x01]); // NS, IN
        packet.extend_from_slice(&[0x00, 0x02, 0xa3, 0x00]); // TTL: 172800
        packet.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        packet.extend_from_slice(&rdata);
    }

    // Glue
    packet.extend_from_slice(&[0xc0, 0x0c]);
    packet.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
    packet.extend_from_slice(&[0x00, 0x02, 0xa3, 0x00]);
    packet.extend_from_slice(&[0x00, 0x04]);
    packet.extend_from_slice(&[192, 5, 6, 30]);

    packet
}

/// A response with no answers pointing at `servers`.
pub fn referral(id: u16, domain: &str, servers: &[&str]) -> Vec<u8> {
    response(id, domain, 0, 0, servers)
}

/// Upstream that replays canned replies and records every exchange.
#[derive(Default)]
pub struct ScriptedUpstream {
    replies: RefCell<VecDeque<io::Result<Vec<u8>>>>,
    /// Repeated once the script runs out.
    fallback: Option<Vec<u8>>,
    sent: RefCell<Vec<(Vec<u8>, SocketAddr)>>,
}

impl ScriptedUpstream {
    pub fn new(replies: Vec<Vec<u8>>) -> Self {
        Self {
            replies: RefCell::new(replies.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    pub fn repeating(reply: Vec<u8>) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    pub fn push_error(&self, kind: io::ErrorKind) {
        self.replies.borrow_mut().push_back(Err(kind.into()));
    }

    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.sent.borrow().len()
    }
}

impl Upstream for ScriptedUpstream {
    async fn exchange(&self, query: &[u8], addr: SocketAddr) -> io::Result<Vec<u8>> {
        self.sent.borrow_mut().push((query.to_vec(), addr));

        match self.replies.borrow_mut().pop_front() {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| io::Error::new(io::ErrorKind::TimedOut, "script exhausted")),
        }
    }
}

/// Host table lookup; unknown names fail with `NotFound`.
#[derive(Default)]
pub struct StaticLookup {
    hosts: HashMap<String, IpAddr>,
}

impl StaticLookup {
    pub fn new(hosts: &[(&str, &str)]) -> Self {
        let hosts = hosts
            .iter()
            .map(|(name, ip)| (name.to_string(), ip.parse().unwrap()))
            .collect();

        Self { hosts }
    }
}

impl HostLookup for StaticLookup {
    async fn lookup(&self, host: &str) -> io::Result<IpAddr> {
        self.hosts
            .get(host)
            .copied()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, host.to_string()))
    }
}
