//! Handshake messages and the responder's negotiation rule.
//!
//! ```text
//! Init Request  ┌─────────────┬─────────────┬─────────────┬─────────┬───────┐
//! (5 bytes)     │ min version │ max version │ length bits │ id bits │ flags │
//!               └─────────────┴─────────────┴─────────────┴─────────┴───────┘
//! Init Accept   ┌──────┬──────────────────┐
//! (2 bytes)     │ 0x00 │ selected version │
//!               └──────┴──────────────────┘
//! Init Reject   ┌──────┐
//! (1 byte)      │ 0x01 │
//!               └──────┘
//! ```

use crate::config::SessionConfig;
use crate::error::{Result, StreamuxError};
use crate::header::HeaderCodec;

/// Init Request size in bytes.
pub const INIT_REQUEST_LENGTH: usize = 5;

/// Init Accept size in bytes.
pub const INIT_ACCEPT_LENGTH: usize = 2;

/// Init Reject size in bytes.
pub const INIT_REJECT_LENGTH: usize = 1;

/// First byte of an Init Response.
pub mod response_code {
    pub const ACCEPT: u8 = 0;
    pub const REJECT: u8 = 1;
}

/// The initiator's opening message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitRequest {
    pub min_version: u8,
    pub max_version: u8,
    pub length_bits: u8,
    pub id_bits: u8,
    /// No flags are defined yet; must be 0.
    pub flags: u8,
}

impl InitRequest {
    pub fn encode(&self) -> [u8; INIT_REQUEST_LENGTH] {
        [
            self.min_version,
            self.max_version,
            self.length_bits,
            self.id_bits,
            self.flags,
        ]
    }

    /// Returns `None` if `data` is too short.
    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < INIT_REQUEST_LENGTH {
            return None;
        }
        Some(Self {
            min_version: data[0],
            max_version: data[1],
            length_bits: data[2],
            id_bits: data[3],
            flags: data[4],
        })
    }
}

/// The responder's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitResponse {
    Accept { version: u8 },
    Reject,
}

impl InitResponse {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            InitResponse::Accept { version } => vec![response_code::ACCEPT, *version],
            InitResponse::Reject => vec![response_code::REJECT],
        }
    }

    /// Wire length of a response starting with `code`.
    pub fn length_for(code: u8) -> Result<usize> {
        match code {
            response_code::ACCEPT => Ok(INIT_ACCEPT_LENGTH),
            response_code::REJECT => Ok(INIT_REJECT_LENGTH),
            other => Err(StreamuxError::ProtocolViolation(format!(
                "unknown init response code {}",
                other
            ))),
        }
    }

    /// Decode a response. `Ok(None)` means more bytes are needed.
    pub fn decode(data: &[u8]) -> Result<Option<Self>> {
        let Some(&code) = data.first() else {
            return Ok(None);
        };
        if data.len() < Self::length_for(code)? {
            return Ok(None);
        }
        Ok(Some(match code {
            response_code::ACCEPT => InitResponse::Accept { version: data[1] },
            _ => InitResponse::Reject,
        }))
    }
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    pub version: u8,
    pub codec: HeaderCodec,
}

/// Decide whether a responder with `config` and the given width capacities
/// accepts `request`. The error string is the rejection reason.
pub fn negotiate(
    config: &SessionConfig,
    length_bits_capacity: u8,
    id_bits_capacity: u8,
    request: &InitRequest,
) -> std::result::Result<Negotiated, String> {
    if request.min_version > request.max_version {
        return Err(format!(
            "peer version range {}..={} is empty",
            request.min_version, request.max_version
        ));
    }
    let low = request.min_version.max(config.min_version);
    let high = request.max_version.min(config.max_version);
    if low > high {
        return Err(format!(
            "no common version: peer {}..={}, local {}..={}",
            request.min_version, request.max_version, config.min_version, config.max_version
        ));
    }
    if request.flags != 0 {
        return Err(format!("unsupported init flags {:#04x}", request.flags));
    }
    if request.length_bits > length_bits_capacity {
        return Err(format!(
            "length field of {} bits exceeds local limit {}",
            request.length_bits, length_bits_capacity
        ));
    }
    if request.id_bits > id_bits_capacity {
        return Err(format!(
            "id field of {} bits exceeds local limit {}",
            request.id_bits, id_bits_capacity
        ));
    }
    let codec = HeaderCodec::new(request.length_bits, request.id_bits).map_err(|e| e.to_string())?;

    Ok(Negotiated { version: high, codec })
}
