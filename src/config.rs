//! Session configuration and protocol constants.

use crate::error::{Result, StreamuxError};

/// Protocol version spoken by this implementation.
pub const PROTOCOL_VERSION: u8 = 1;

/// Number of flag bits in every frame header (termination, response).
pub const FLAG_BITS: u8 = 2;

/// Upper bound on `id_bits + length_bits + FLAG_BITS`.
pub const MAX_HEADER_BITS: u8 = 32;

/// Priority values attached to outbound frames.
pub mod priority {
    /// Lowest data priority.
    pub const MIN: u16 = 0;
    /// Highest data priority.
    pub const MAX: u16 = 65534;
    /// Out-of-band priority, reserved for control frames.
    pub const OOB: u16 = 65535;
}

/// Which end of the connection a session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Sends the Init Request.
    Initiator,
    /// Answers the Init Request.
    Responder,
}

/// Construction-time parameters of a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Initiator or responder.
    pub role: Role,
    /// Lowest protocol version this side accepts.
    pub min_version: u8,
    /// Highest protocol version this side accepts.
    pub max_version: u8,
    /// Largest payload placed in one outbound chunk. Clamped to the
    /// negotiated length field at negotiation time.
    pub max_chunk_length: u32,
    /// Highest priority accepted for data chunks.
    pub max_data_priority: u16,
    /// Priority used for handshake, cancel, cancel-ack, ping and pong frames.
    pub control_priority: u16,
}

impl SessionConfig {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            min_version: PROTOCOL_VERSION,
            max_version: PROTOCOL_VERSION,
            max_chunk_length: u32::MAX,
            max_data_priority: priority::MAX,
            control_priority: priority::OOB,
        }
    }

    pub fn initiator() -> Self {
        Self::new(Role::Initiator)
    }

    pub fn responder() -> Self {
        Self::new(Role::Responder)
    }

    pub fn with_versions(mut self, min_version: u8, max_version: u8) -> Self {
        self.min_version = min_version;
        self.max_version = max_version;
        self
    }

    pub fn with_max_chunk_length(mut self, max_chunk_length: u32) -> Self {
        self.max_chunk_length = max_chunk_length;
        self
    }

    pub fn with_priorities(mut self, max_data_priority: u16, control_priority: u16) -> Self {
        self.max_data_priority = max_data_priority;
        self.control_priority = control_priority;
        self
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.min_version == 0 || self.min_version > self.max_version {
            return Err(StreamuxError::InvalidConfig(format!(
                "version range {}..={} is empty or starts at 0",
                self.min_version, self.max_version
            )));
        }
        if self.max_chunk_length == 0 {
            return Err(StreamuxError::InvalidConfig(
                "max_chunk_length must be at least 1".to_string(),
            ));
        }
        if self.max_data_priority >= self.control_priority {
            return Err(StreamuxError::InvalidConfig(format!(
                "data priority {} must be below control priority {}",
                self.max_data_priority, self.control_priority
            )));
        }
        Ok(())
    }

    /// True if `version` lies in this side's supported range.
    pub fn supports_version(&self, version: u8) -> bool {
        (self.min_version..=self.max_version).contains(&version)
    }
}
