//! Domain name decoding with compression pointer support.

use super::{ParseError, byte_at};

/// Tag values at or above this mark a compression pointer.
const POINTER_TAG: u8 = 0xC0;

/// Low six bits of a pointer tag hold the high bits of the offset.
const POINTER_OFFSET_MASK: u8 = 0x3F;

/// Jumps allowed while decoding a single name.
const MAX_POINTER_JUMPS: usize = 64;

/// Decode the domain name that starts at `pos`.
///
/// Returns the dotted name and how far the caller's cursor has to move to
/// step over it. Only bytes at the original position count: the labels read
/// there, plus one byte for the terminator or two for the first compression
/// pointer. Labels reached through a pointer never move the caller's cursor,
/// however many of them or however many further pointers follow.
///
/// The root name decodes to an empty string.
pub fn read_name(buf: &[u8], pos: usize) -> Result<(String, usize), ParseError> {
    let mut name = String::new();
    let mut read_pos = pos;
    let mut consumed = 0;
    let mut jumps = 0;

    loop {
        let tag = byte_at(buf, read_pos)?;

        if tag == 0 {
            if jumps == 0 {
                consumed += 1;
            }
            break;
        }

        if tag >= POINTER_TAG {
            let low = byte_at(buf, read_pos + 1)?;
            if jumps == 0 {
                consumed += 2;
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(ParseError::PointerLoop { offset: pos });
            }
            read_pos = usize::from(u16::from_be_bytes([tag & POINTER_OFFSET_MASK, low]));
            continue;
        }

        let len = usize::from(tag);
        let start = read_pos + 1;
        let label = buf
            .get(start..start + len)
            .ok_or(ParseError::OutOfBounds {
                offset: start + len - 1,
                len: buf.len(),
            })?;

        // One char per byte, so odd label bytes never fail the decode.
        name.extend(label.iter().map(|&b| char::from(b)));
        name.push('.');

        read_pos = start + len;
        if jumps == 0 {
            consumed += 1 + len;
        }
    }

    name.pop();
    Ok((name, consumed))
}
