//! DNS message view over a raw packet.

use super::{ParseError, read_name, read_u16};

/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

/// RCODE for a name that does not exist (NXDOMAIN).
pub const RCODE_NAME_ERROR: u8 = 3;

// Header layout
const ID_OFFSET: usize = 0;
const FLAGS_HIGH: usize = 2;
const FLAGS_LOW: usize = 3;
const ANCOUNT_OFFSET: usize = 6;
const NSCOUNT_OFFSET: usize = 8;
const ARCOUNT_OFFSET: usize = 10;

// Bits of FLAGS_HIGH
const QR_BIT: u8 = 0x80;
const OPCODE_MASK: u8 = 0x78;
const AA_BIT: u8 = 0x04;

// Bits of FLAGS_LOW
const RA_BIT: u8 = 0x80;
const RCODE_MASK: u8 = 0x0F;

/// QTYPE + QCLASS
const QUESTION_FIXED_LEN: usize = 4;
/// TYPE + CLASS + TTL
const RECORD_FIXED_LEN: usize = 8;
const RDLENGTH_LEN: usize = 2;

/// A DNS message parsed just far enough to drive iterative resolution.
///
/// Owns its packet bytes. Parsing drops the additional section and zeroes
/// ARCOUNT, so [`Message::as_bytes`] is always the question, answer and
/// authority sections only. Counts and the response code are captured at
/// parse time and do not follow later flag changes.
#[derive(Debug, Clone)]
pub struct Message {
    bytes: Vec<u8>,
    question: String,
    answer_count: u16,
    authority_count: u16,
    response_code: u8,
    authority: Option<String>,
}

impl Message {
    /// Parse a raw DNS packet.
    ///
    /// Answer records are stepped over without looking inside them. For
    /// authority records the RDATA is decoded as a server name, and the
    /// cursor then moves by RDLENGTH rather than by what the name decode
    /// consumed. Only the first authority's server name is kept.
    pub fn parse(mut bytes: Vec<u8>) -> Result<Self, ParseError> {
        if bytes.len() < HEADER_LEN {
            return Err(ParseError::TooShort { len: bytes.len() });
        }

        let answer_count = read_u16(&bytes, ANCOUNT_OFFSET)?;
        let authority_count = read_u16(&bytes, NSCOUNT_OFFSET)?;
        let response_code = bytes[FLAGS_LOW] & RCODE_MASK;

        let (question, consumed) = read_name(&bytes, HEADER_LEN)?;
        let mut pos = HEADER_LEN + consumed + QUESTION_FIXED_LEN;

        for _ in 0..answer_count {
            pos = skip_record(&bytes, pos)?;
        }

        let mut authority = None;
        for _ in 0..authority_count {
            let (_, consumed) = read_name(&bytes, pos)?;
            pos += consumed + RECORD_FIXED_LEN;
            let rdlength = usize::from(read_u16(&bytes, pos)?);
            pos += RDLENGTH_LEN;
            let (server, _) = read_name(&bytes, pos)?;
            authority.get_or_insert(server);
            pos += rdlength;
        }

        if pos > bytes.len() {
            return Err(ParseError::OutOfBounds {
                offset: pos,
                len: bytes.len(),
            });
        }

        bytes.truncate(pos);
        bytes[ARCOUNT_OFFSET..ARCOUNT_OFFSET + 2].fill(0);

        Ok(Self {
            bytes,
            question,
            answer_count,
            authority_count,
            response_code,
            authority,
        })
    }

    /// The packet as it would go on the wire, including any flag changes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn id(&self) -> u16 {
        u16::from_be_bytes([self.bytes[ID_OFFSET], self.bytes[ID_OFFSET + 1]])
    }

    pub fn opcode(&self) -> u8 {
        (self.bytes[FLAGS_HIGH] & OPCODE_MASK) >> 3
    }

    /// The name in the question section.
    pub fn queried_domain(&self) -> &str {
        &self.question
    }

    /// Server name from the first authority record, if there was one.
    pub fn authority_domain(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    pub fn answer_count(&self) -> u16 {
        self.answer_count
    }

    pub fn authority_count(&self) -> u16 {
        self.authority_count
    }

    /// RCODE as read when the message was parsed.
    pub fn response_code(&self) -> u8 {
        self.response_code
    }

    pub fn is_response(&self) -> bool {
        self.bytes[FLAGS_HIGH] & QR_BIT != 0
    }

    /// Whether this message ends an iterative chain.
    ///
    /// A response is terminal when it carries an answer, an error code, or
    /// no authority to be referred to. Queries are never terminal.
    pub fn is_terminal_answer(&self) -> bool {
        self.is_response()
            && (self.answer_count > 0 || self.response_code != 0 || self.authority.is_none())
    }

    pub fn set_response_bit(&mut self, on: bool) {
        self.set_flag(FLAGS_HIGH, QR_BIT, on);
    }

    pub fn set_authoritative_answer_bit(&mut self, on: bool) {
        self.set_flag(FLAGS_HIGH, AA_BIT, on);
    }

    pub fn set_recursion_available_bit(&mut self, on: bool) {
        self.set_flag(FLAGS_LOW, RA_BIT, on);
    }

    /// Set RCODE to NXDOMAIN, keeping RA and Z.
    pub fn set_response_code_name_error(&mut self) {
        let flags = &mut self.bytes[FLAGS_LOW];
        *flags = (*flags & !RCODE_MASK) | RCODE_NAME_ERROR;
    }

    fn set_flag(&mut self, offset: usize, mask: u8, on: bool) {
        if on {
            self.bytes[offset] |= mask;
        } else {
            self.bytes[offset] &= !mask;
        }
    }
}

/// Step over one resource record, returning the offset just past it.
fn skip_record(buf: &[u8], pos: usize) -> Result<usize, ParseError> {
    let (_, consumed) = read_name(buf, pos)?;
    let pos = pos + consumed + RECORD_FIXED_LEN;
    let rdlength = usize::from(read_u16(buf, pos)?);
    Ok(pos + RDLENGTH_LEN + rdlength)
}
