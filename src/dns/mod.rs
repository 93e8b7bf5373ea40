//! DNS wire format handling.
//!
//! Only what the iterative resolver needs: decoding names, walking the
//! answer and authority sections, and flipping header flags in place.

mod message;
mod name;

pub use message::{HEADER_LEN, Message, RCODE_NAME_ERROR};
pub use name::read_name;

use thiserror::Error;

/// Errors raised while walking a DNS message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Message is shorter than the fixed header.
    #[error("message too short: {len} bytes, header needs 12")]
    TooShort { len: usize },

    /// A label, pointer or record field runs past the end of the message.
    #[error("offset {offset} is past the end of a {len} byte message")]
    OutOfBounds { offset: usize, len: usize },

    /// Compression pointers never reach a terminator.
    #[error("compression pointer loop in name at offset {offset}")]
    PointerLoop { offset: usize },
}

fn byte_at(buf: &[u8], offset: usize) -> Result<u8, ParseError> {
    buf.get(offset).copied().ok_or(ParseError::OutOfBounds {
        offset,
        len: buf.len(),
    })
}

fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ParseError> {
    let hi = byte_at(buf, offset)?;
    let lo = byte_at(buf, offset + 1)?;
    Ok(u16::from_be_bytes([hi, lo]))
}
