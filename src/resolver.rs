//! Iterative DNS resolution.
//!
//! Starts at a root server and follows referrals until some server gives a
//! terminal answer:
//! 1. Send the client's query to a root server
//! 2. While the reply is a referral, look up the referred server and resend
//!    the same client query to it
//! 3. Hand back the last reply, flagged as recursive and non-authoritative
//!
//! Sockets and name lookups sit behind [`Upstream`] and [`HostLookup`] so the
//! chain can be driven without a network.

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};

use rand::seq::IndexedRandom;
use thiserror::Error;
use tracing::{debug, warn};

use crate::dns::{Message, ParseError};

/// Port every root and authority server is queried on.
pub const DNS_PORT: u16 = 53;

/// Exchanges per resolution, the root query included.
pub const MAX_HOPS: usize = 16;

/// The 13 published root server hostnames.
pub const ROOT_SERVERS: [&str; 13] = [
    "a.root-servers.net",
    "b.root-servers.net",
    "c.root-servers.net",
    "d.root-servers.net",
    "e.root-servers.net",
    "f.root-servers.net",
    "g.root-servers.net",
    "h.root-servers.net",
    "i.root-servers.net",
    "j.root-servers.net",
    "k.root-servers.net",
    "l.root-servers.net",
    "m.root-servers.net",
];

/// Sends one query datagram and waits for the reply.
pub trait Upstream {
    fn exchange(&self, query: &[u8], addr: SocketAddr)
    -> impl Future<Output = io::Result<Vec<u8>>>;
}

/// Turns a server hostname into an address.
pub trait HostLookup {
    fn lookup(&self, host: &str) -> impl Future<Output = io::Result<IpAddr>>;
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("malformed message: {0}")]
    Parse(#[from] ParseError),

    #[error("upstream exchange failed: {0}")]
    Io(#[from] io::Error),

    #[error("could not resolve root server {host}: {source}")]
    RootLookup { host: String, source: io::Error },

    #[error("no root servers configured")]
    NoRootServers,
}

/// Hostnames a resolution may start from.
#[derive(Debug, Clone)]
pub struct RootServers {
    hosts: Vec<String>,
}

impl RootServers {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Pick one root uniformly at random.
    pub fn choose(&self) -> Option<&str> {
        self.hosts.choose(&mut rand::rng()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl Default for RootServers {
    fn default() -> Self {
        Self::new(ROOT_SERVERS)
    }
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Port used for every root and authority server.
    pub upstream_port: u16,
    /// Upper bound on exchanges for one client query.
    pub max_hops: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            upstream_port: DNS_PORT,
            max_hops: MAX_HOPS,
        }
    }
}

/// Walks the DNS hierarchy for one client query at a time.
///
/// Holds no per-query state, so a single resolver can serve any number of
/// interleaved resolutions as long as its [`Upstream`] keeps their replies
/// apart.
pub struct Resolver<U, L> {
    upstream: U,
    lookup: L,
    roots: RootServers,
    config: ResolverConfig,
}

impl<U: Upstream, L: HostLookup> Resolver<U, L> {
    pub fn new(upstream: U, lookup: L, roots: RootServers, config: ResolverConfig) -> Self {
        Self {
            upstream,
            lookup,
            roots,
            config,
        }
    }

    pub fn upstream(&self) -> &U {
        &self.upstream
    }

    pub fn roots(&self) -> &RootServers {
        &self.roots
    }

    /// Resolve `query` starting from a randomly chosen root server.
    pub async fn resolve_from_root(&self, query: &[u8]) -> Result<Message, ResolveError> {
        let host = self.roots.choose().ok_or(ResolveError::NoRootServers)?;
        let root = self
            .lookup
            .lookup(host)
            .await
            .map_err(|source| ResolveError::RootLookup {
                host: host.to_string(),
                source,
            })?;

        debug!(root = host, addr = %root, "selected root server");
        self.resolve(query, root).await
    }

    /// Resolve `query` starting from the root server at `root`.
    ///
    /// Every hop resends the client's own query bytes, so the reply keeps the
    /// client's ID and question. The chain stops at a terminal answer, after
    /// `max_hops` exchanges, or when a referred server's name can't be looked
    /// up; in the last two cases the most recent reply is returned as is.
    pub async fn resolve(&self, query: &[u8], root: IpAddr) -> Result<Message, ResolveError> {
        let query = Message::parse(query.to_vec())?;
        let domain = query.queried_domain();

        let mut response = self.exchange(&query, root).await?;
        let mut hops = 1;

        while !response.is_terminal_answer() && hops < self.config.max_hops {
            let Some(authority) = response.authority_domain() else {
                break;
            };

            let addr = match self.lookup.lookup(authority).await {
                Ok(addr) => addr,
                Err(e) => {
                    warn!(
                        domain,
                        authority,
                        error = %e,
                        "authority lookup failed, returning last response"
                    );
                    break;
                }
            };

            debug!(
                domain,
                authority,
                servers = response.authority_count(),
                %addr,
                hop = hops + 1,
                "following referral"
            );
            response = self.exchange(&query, addr).await?;
            hops += 1;
        }

        if !response.is_terminal_answer() {
            debug!(domain, hops, "giving up before a terminal answer");
        }

        response.set_recursion_available_bit(true);
        response.set_authoritative_answer_bit(false);

        Ok(response)
    }

    async fn exchange(&self, query: &Message, ip: IpAddr) -> Result<Message, ResolveError> {
        let addr = SocketAddr::new(ip, self.config.upstream_port);
        let reply = self.upstream.exchange(query.as_bytes(), addr).await?;

        Ok(Message::parse(reply)?)
    }
}
