//! Sinkhole - an iterative DNS resolver that refuses blocked domains.
//!
//! Queries are resolved by walking the hierarchy from a root server down to
//! an authoritative answer. Names on the blocklist get NXDOMAIN instead.

pub mod dns;
pub mod filter;
pub mod resolver;
pub mod server;
pub mod stats;
pub mod transport;

#[cfg(test)]
mod testing;
