//! Blocklist of sinkholed domains.
//!
//! Loaded once at startup from a plain text file with one domain per line.
//! Reading stops at the first blank line.

use rustc_hash::FxHashSet;
use std::fs;
use std::io;
use std::path::Path;

/// A set of blocked domains for efficient lookup.
#[derive(Debug, Default)]
pub struct Blocklist {
    domains: FxHashSet<String>,
}

impl Blocklist {
    /// Read a blocklist file.
    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;

        Ok(Self::parse(&text))
    }

    /// Build a blocklist from file contents.
    pub fn parse(text: &str) -> Self {
        let domains = text
            .lines()
            .take_while(|line| !line.is_empty())
            .map(str::to_owned)
            .collect();

        Self { domains }
    }

    /// Check if a domain should be blocked.
    ///
    /// Exact, case-sensitive match only: subdomains of a listed name are
    /// not blocked.
    pub fn is_blocked(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    /// Returns the number of domains in the blocklist.
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for Blocklist {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            domains: iter.into_iter().map(Into::into).collect(),
        }
    }
}
