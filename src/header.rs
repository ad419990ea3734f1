//! Bit-packed frame header codec.
//!
//! Every frame starts with one header whose field widths are fixed when the
//! session negotiates. The fields are packed into a single integer, most
//! significant field first, and written big-endian using the fewest bytes
//! that hold all bits:
//!
//! ```text
//! ┌────────────────┬────────────────────┬──────────┬─────────────┐
//! │ id             │ payload length     │ response │ termination │
//! │ id_bits        │ length_bits        │ 1 bit    │ 1 bit       │
//! └────────────────┴────────────────────┴──────────┴─────────────┘
//!  bit (id_bits + length_bits + 2 - 1)                        bit 0
//! ```
//!
//! For `id_bits = 4, length_bits = 8` the header is 14 bits wide and so
//! occupies 2 bytes; unused high bits are zero.

use crate::config::{FLAG_BITS, MAX_HEADER_BITS};
use crate::error::{Result, StreamuxError};

/// Header flag bits.
pub mod flags {
    pub const TERMINATION: u32 = 0b01;
    pub const RESPONSE: u32 = 0b10;
}

/// Largest possible header, in bytes.
pub const MAX_HEADER_LENGTH: usize = (MAX_HEADER_BITS as usize) / 8;

/// Minimal number of bits needed to represent `max_value`,
/// i.e. `ceil(log2(max_value + 1))`.
pub fn bits_for(max_value: u32) -> u8 {
    (u32::BITS - max_value.leading_zeros()) as u8
}

/// Which half of an exchange a chunk belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn is_response(self) -> bool {
        self == Direction::Response
    }

    pub fn from_response_flag(is_response: bool) -> Self {
        if is_response {
            Direction::Response
        } else {
            Direction::Request
        }
    }
}

/// The decoded fields of one frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub id: u32,
    pub payload_length: u32,
    pub is_response: bool,
    pub is_termination: bool,
}

impl FrameHeader {
    pub fn new(id: u32, payload_length: u32, is_response: bool, is_termination: bool) -> Self {
        Self {
            id,
            payload_length,
            is_response,
            is_termination,
        }
    }

    pub fn direction(&self) -> Direction {
        Direction::from_response_flag(self.is_response)
    }

    /// Zero-length frames carry control meaning instead of data.
    pub fn is_control(&self) -> bool {
        self.payload_length == 0
    }
}

/// An encoded header; derefs to its wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedHeader {
    bytes: [u8; MAX_HEADER_LENGTH],
    len: usize,
}

impl EncodedHeader {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[MAX_HEADER_LENGTH - self.len..]
    }
}

impl std::ops::Deref for EncodedHeader {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Packs and unpacks headers for one set of negotiated field widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderCodec {
    length_bits: u8,
    id_bits: u8,
    header_length: usize,
}

impl HeaderCodec {
    /// Build a codec; both widths must be at least 1 and the whole header
    /// must fit in [`MAX_HEADER_BITS`].
    pub fn new(length_bits: u8, id_bits: u8) -> Result<Self> {
        if length_bits == 0 || id_bits == 0 {
            return Err(StreamuxError::InvalidConfig(format!(
                "bit widths must be non-zero (length {}, id {})",
                length_bits, id_bits
            )));
        }
        let total = length_bits as u32 + id_bits as u32 + FLAG_BITS as u32;
        if total > MAX_HEADER_BITS as u32 {
            return Err(StreamuxError::InvalidConfig(format!(
                "header needs {} bits, max {}",
                total, MAX_HEADER_BITS
            )));
        }
        Ok(Self {
            length_bits,
            id_bits,
            header_length: total.div_ceil(8) as usize,
        })
    }

    pub fn length_bits(&self) -> u8 {
        self.length_bits
    }

    pub fn id_bits(&self) -> u8 {
        self.id_bits
    }

    /// Header size on the wire, in bytes.
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// Largest id the id field can carry.
    pub fn max_id(&self) -> u32 {
        mask(self.id_bits)
    }

    /// Largest payload length the length field can carry.
    pub fn max_payload_length(&self) -> u32 {
        mask(self.length_bits)
    }

    fn length_shift(&self) -> u32 {
        FLAG_BITS as u32
    }

    fn id_shift(&self) -> u32 {
        FLAG_BITS as u32 + self.length_bits as u32
    }

    /// Encode a header, failing if a field overflows its width.
    pub fn encode(&self, header: &FrameHeader) -> Result<EncodedHeader> {
        if header.id > self.max_id() {
            return Err(StreamuxError::FieldOverflow {
                field: "id",
                value: header.id,
                bits: self.id_bits,
            });
        }
        if header.payload_length > self.max_payload_length() {
            return Err(StreamuxError::FieldOverflow {
                field: "payload length",
                value: header.payload_length,
                bits: self.length_bits,
            });
        }

        let mut value = (header.id << self.id_shift()) | (header.payload_length << self.length_shift());
        if header.is_response {
            value |= flags::RESPONSE;
        }
        if header.is_termination {
            value |= flags::TERMINATION;
        }

        Ok(EncodedHeader {
            bytes: value.to_be_bytes(),
            len: self.header_length,
        })
    }

    /// Decode a header from the first `header_length()` bytes of `data`.
    ///
    /// Returns `None` if `data` is too short.
    pub fn decode(&self, data: &[u8]) -> Option<FrameHeader> {
        if data.len() < self.header_length {
            return None;
        }
        let value = data[..self.header_length]
            .iter()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);

        Some(FrameHeader {
            id: (value >> self.id_shift()) & self.max_id(),
            payload_length: (value >> self.length_shift()) & self.max_payload_length(),
            is_response: value & flags::RESPONSE != 0,
            is_termination: value & flags::TERMINATION != 0,
        })
    }
}

fn mask(bits: u8) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}
