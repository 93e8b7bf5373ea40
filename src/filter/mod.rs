//! Domain filtering.
//!
//! Queries for names on the blocklist are answered locally with NXDOMAIN
//! instead of being resolved.

mod blocklist;

pub use blocklist::Blocklist;

use crate::dns::Message;

/// Turn a parsed client query into its blocked reply, in place.
///
/// Sets RCODE to NXDOMAIN plus the QR and RA bits; everything else,
/// including the question and ID, stays as the client sent it.
pub fn sinkhole_response(query: &mut Message) {
    query.set_response_code_name_error();
    query.set_response_bit(true);
    query.set_recursion_available_bit(true);
}
