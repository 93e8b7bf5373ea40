//! Sinkhole server orchestration.
//!
//! Decides what to do with each client query and runs the UDP server with
//! a periodic stats report.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dns::{Message, ParseError};
use crate::filter::{Blocklist, sinkhole_response};
use crate::resolver::{HostLookup, Resolver, ResolverConfig, RootServers, Upstream};
use crate::stats::Stats;
use crate::transport::SystemLookup;
use crate::transport::udp::{UdpTransport, UdpUpstream};

/// Configuration for the sinkhole server.
pub struct ServerConfig {
    /// Local address to bind (e.g., 0.0.0.0:5300)
    pub bind_addr: SocketAddr,
    /// Blocklist file; `None` blocks nothing
    pub blocklist: Option<PathBuf>,
    /// Port root and authority servers are queried on
    pub upstream_port: u16,
    /// How long to wait for each upstream reply; `None` waits forever
    pub hop_timeout: Option<Duration>,
    /// How often to log and reset stats
    pub stats_interval: Duration,
}

/// Action to take for a client query.
pub enum QueryAction {
    /// Domain is blocked, send this reply straight back.
    Blocked(Message),
    /// Domain has to be resolved.
    Resolve(Message),
}

/// Answers client queries: blocked names locally, everything else by
/// iterative resolution.
pub struct Sinkhole<U, L> {
    blocklist: Blocklist,
    resolver: Resolver<U, L>,
    stats: Stats,
}

impl<U: Upstream, L: HostLookup> Sinkhole<U, L> {
    pub fn new(blocklist: Blocklist, resolver: Resolver<U, L>) -> Self {
        Self {
            blocklist,
            resolver,
            stats: Stats::new(),
        }
    }

    /// Decide what to do with a raw client query.
    ///
    /// Blocked queries come back already rewritten into their NXDOMAIN reply.
    pub fn process_query(&self, query: &[u8]) -> Result<QueryAction, ParseError> {
        let mut message = Message::parse(query.to_vec())?;

        if self.blocklist.is_blocked(message.queried_domain()) {
            sinkhole_response(&mut message);
            return Ok(QueryAction::Blocked(message));
        }

        Ok(QueryAction::Resolve(message))
    }

    /// Produce the reply for one client query.
    ///
    /// Returns `None` when the query gets no reply at all: it didn't parse,
    /// or resolution failed on the way. Failures are logged here and go no
    /// further.
    pub async fn answer(&self, query: &[u8]) -> Option<Vec<u8>> {
        let start_time = Instant::now();

        let action = match self.process_query(query) {
            Ok(action) => action,
            Err(e) => {
                warn!(error = %e, "dropping malformed query");
                self.stats.record_failed();
                return None;
            }
        };

        match action {
            QueryAction::Blocked(response) => {
                let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
                debug!(
                    id = response.id(),
                    domain = response.queried_domain(),
                    elapsed_ms,
                    "blocked"
                );
                self.stats.record_blocked(elapsed_ms);
                Some(response.into_bytes())
            }
            QueryAction::Resolve(message) => {
                let domain = message.queried_domain();
                let id = message.id();
                if message.opcode() != 0 {
                    debug!(id, domain, opcode = message.opcode(), "non-standard opcode");
                }

                match self.resolver.resolve_from_root(message.as_bytes()).await {
                    Ok(response) => {
                        let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
                        debug!(
                            id,
                            domain,
                            rcode = response.response_code(),
                            answers = response.answer_count(),
                            elapsed_ms,
                            "resolved"
                        );
                        self.stats.record_resolved(elapsed_ms);
                        Some(response.into_bytes())
                    }
                    Err(e) => {
                        warn!(id, domain, error = %e, "resolution failed");
                        self.stats.record_failed();
                        None
                    }
                }
            }
        }
    }

    pub fn resolver(&self) -> &Resolver<U, L> {
        &self.resolver
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Returns the number of domains in the blocklist.
    pub fn blocked_count(&self) -> usize {
        self.blocklist.len()
    }
}

/// Run the sinkhole with the given configuration.
///
/// Binds the listening socket and serves forever. Only startup failures
/// are returned; per-query failures are logged and skipped.
pub async fn run(config: ServerConfig) -> io::Result<()> {
    let blocklist = match &config.blocklist {
        Some(path) => Blocklist::load(path).unwrap_or_else(|e| {
            warn!(
                path = %path.display(),
                error = %e,
                "could not read blocklist, nothing will be blocked"
            );
            Blocklist::default()
        }),
        None => Blocklist::default(),
    };

    let resolver = Resolver::new(
        UdpUpstream::new(config.hop_timeout),
        SystemLookup,
        RootServers::default(),
        ResolverConfig {
            upstream_port: config.upstream_port,
            ..ResolverConfig::default()
        },
    );
    let sinkhole = Rc::new(Sinkhole::new(blocklist, resolver));

    let udp = UdpTransport::bind(config.bind_addr).await?;

    info!(
        addr = %udp.local_addr()?,
        blocked = sinkhole.blocked_count(),
        roots = sinkhole.resolver().roots().len(),
        "sinkhole listening"
    );
    match config.hop_timeout {
        Some(timeout) => info!(?timeout, "upstream hop timeout"),
        None => warn!("upstream hop timeout disabled, lost replies hold their query forever"),
    }

    udp.start(sinkhole.clone());

    let stats_interval = config.stats_interval;
    tokio::task::spawn_local(async move {
        let mut interval = tokio::time::interval(stats_interval);
        interval.tick().await; // Skip first immediate tick
        loop {
            interval.tick().await;
            let stats = sinkhole.stats().snapshot_and_reset();
            info!(
                requests = stats.requests,
                resolved = stats.resolved,
                blocked = stats.blocked,
                failed = stats.failed,
                avg_response_ms = %format!("{:.2}", stats.avg_response_ms),
                "stats"
            );
        }
    });

    // Keep running forever
    std::future::pending::<()>().await;

    Ok(())
}
