//! Wire framing for the six packet kinds (§3/§4.A of the protocol spec).
//!
//! All integers are network byte order. `cstr` fields are non-NUL bytes
//! terminated by a single NUL byte.

use crate::error::{TftpError, TftpErrorCode};

const OPCODE_RRQ: u16 = 1;
const OPCODE_WRQ: u16 = 2;
const OPCODE_DATA: u16 = 3;
const OPCODE_ACK: u16 = 4;
const OPCODE_ERROR: u16 = 5;
const OPCODE_DRQ: u16 = 6;

/// Maximum DATA payload per block (§3 `max_block_bytes`, fixed, no
/// RFC 2347/2348 negotiation).
pub const BLOCK_SIZE: usize = 512;

/// Largest datagram this crate ever sends or accepts: a 4-byte DATA
/// header plus one full block.
pub const MAX_PACKET_SIZE: usize = 4 + BLOCK_SIZE;

/// Transfer mode. The spec restricts this to the ASCII token "octet"
/// (case-insensitive); no other mode is accepted.
pub const MODE_OCTET: &str = "octet";

/// A fully parsed TFTP packet, including the DRQ extension (opcode 6).
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Packet {
    RRQ { filename: Vec<u8>, mode: Vec<u8> },
    WRQ { filename: Vec<u8>, mode: Vec<u8> },
    DATA { block: u16, payload: Vec<u8> },
    ACK { block: u16 },
    ERROR { code: u16, message: Vec<u8> },
    DRQ { filename: Vec<u8>, mode: Vec<u8> },
}

impl Packet {
    /// Opcode this packet would be framed with.
    pub fn opcode(&self) -> u16 {
        match self {
            Packet::RRQ { .. } => OPCODE_RRQ,
            Packet::WRQ { .. } => OPCODE_WRQ,
            Packet::DATA { .. } => OPCODE_DATA,
            Packet::ACK { .. } => OPCODE_ACK,
            Packet::ERROR { .. } => OPCODE_ERROR,
            Packet::DRQ { .. } => OPCODE_DRQ,
        }
    }

    /// Serialize to bytes ready for `sendto`.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::RRQ { filename, mode } | Packet::WRQ { filename, mode } => {
                encode_request(self.opcode(), filename, mode)
            }
            Packet::DRQ { filename, mode } => encode_request(OPCODE_DRQ, filename, mode),
            Packet::DATA { block, payload } => encode_data(*block, payload),
            Packet::ACK { block } => encode_ack(*block),
            Packet::ERROR { code, message } => encode_error_raw(*code, message),
        }
    }

    /// Parse a received datagram. Malformed shapes (too short, missing
    /// the terminating NUL) produce `Err` — the caller reports "undefined
    /// error" rather than crashing on a hostile or corrupt datagram.
    pub fn decode(buf: &[u8]) -> Result<Packet, TftpError> {
        if buf.len() < 2 {
            return Err(TftpError::Malformed("packet shorter than opcode field"));
        }
        let opcode = u16::from_be_bytes([buf[0], buf[1]]);
        match opcode {
            OPCODE_RRQ => decode_request(&buf[2..]).map(|(filename, mode)| Packet::RRQ {
                filename,
                mode,
            }),
            OPCODE_WRQ => decode_request(&buf[2..]).map(|(filename, mode)| Packet::WRQ {
                filename,
                mode,
            }),
            OPCODE_DRQ => decode_request(&buf[2..]).map(|(filename, mode)| Packet::DRQ {
                filename,
                mode,
            }),
            OPCODE_DATA => decode_data(&buf[2..]),
            OPCODE_ACK => decode_ack(&buf[2..]),
            OPCODE_ERROR => decode_error(&buf[2..]),
            _ => Err(TftpError::Malformed("unrecognized opcode")),
        }
    }
}

/// Build a request packet (RRQ/WRQ/DRQ share this shape):
/// `[opcode:u16 BE][filename cstr][mode cstr]`.
pub fn encode_request(opcode: u16, filename: &[u8], mode: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + filename.len() + 1 + mode.len() + 1);
    buf.extend_from_slice(&opcode.to_be_bytes());
    buf.extend_from_slice(filename);
    buf.push(0);
    buf.extend_from_slice(mode);
    buf.push(0);
    buf
}

/// `[0,3][block:u16 BE][payload: 0..512 bytes]`
pub fn encode_data(block: u16, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= BLOCK_SIZE);
    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&OPCODE_DATA.to_be_bytes());
    buf.extend_from_slice(&block.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// `[0,4][block:u16 BE]`
pub fn encode_ack(block: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4);
    buf.extend_from_slice(&OPCODE_ACK.to_be_bytes());
    buf.extend_from_slice(&block.to_be_bytes());
    buf
}

/// `[0,5][code:u16 BE][message cstr]`. When `custom` is given, the wire
/// message is `"<canonical> - <custom>"`, truncated to fit within the
/// 512-byte error payload budget and NUL terminated. The codec owns this
/// truncation so callers never reason about the 512-byte ceiling
/// themselves.
pub fn encode_error(code: TftpErrorCode, custom: Option<&str>) -> Vec<u8> {
    let message = match custom {
        Some(custom) => format!("{} - {}", code.message(), custom),
        None => code.message().to_string(),
    };
    encode_error_raw(code as u16, message.as_bytes())
}

fn encode_error_raw(code: u16, message: &[u8]) -> Vec<u8> {
    // 4-byte header + message + terminating NUL, capped at BLOCK_SIZE.
    let max_message_len = BLOCK_SIZE.saturating_sub(1);
    let truncated = &message[..message.len().min(max_message_len)];

    let mut buf = Vec::with_capacity(4 + truncated.len() + 1);
    buf.extend_from_slice(&OPCODE_ERROR.to_be_bytes());
    buf.extend_from_slice(&code.to_be_bytes());
    buf.extend_from_slice(truncated);
    buf.push(0);
    buf
}

fn split_cstr(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let nul = buf.iter().position(|&b| b == 0)?;
    Some((&buf[..nul], &buf[nul + 1..]))
}

fn decode_request(payload: &[u8]) -> Result<(Vec<u8>, Vec<u8>), TftpError> {
    let (filename, rest) =
        split_cstr(payload).ok_or(TftpError::Malformed("request missing filename NUL"))?;
    let (mode, _rest) =
        split_cstr(rest).ok_or(TftpError::Malformed("request missing mode NUL"))?;
    if filename.is_empty() {
        return Err(TftpError::Malformed("empty filename"));
    }
    Ok((filename.to_vec(), mode.to_vec()))
}

fn decode_data(payload: &[u8]) -> Result<Packet, TftpError> {
    if payload.len() < 2 {
        return Err(TftpError::Malformed("DATA packet too short"));
    }
    let block = u16::from_be_bytes([payload[0], payload[1]]);
    let data = payload[2..].to_vec();
    if data.len() > BLOCK_SIZE {
        return Err(TftpError::Malformed("DATA payload exceeds block size"));
    }
    Ok(Packet::DATA {
        block,
        payload: data,
    })
}

fn decode_ack(payload: &[u8]) -> Result<Packet, TftpError> {
    if payload.len() < 2 {
        return Err(TftpError::Malformed("ACK packet too short"));
    }
    let block = u16::from_be_bytes([payload[0], payload[1]]);
    Ok(Packet::ACK { block })
}

fn decode_error(payload: &[u8]) -> Result<Packet, TftpError> {
    if payload.len() < 2 {
        return Err(TftpError::Malformed("ERROR packet too short"));
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    let rest = &payload[2..];
    let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
    Ok(Packet::ERROR {
        code,
        message: rest[..end].to_vec(),
    })
}

/// Case-insensitive match against the single accepted transfer mode.
pub fn is_octet_mode(mode: &[u8]) -> bool {
    mode.eq_ignore_ascii_case(MODE_OCTET.as_bytes())
}
