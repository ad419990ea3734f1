//! Error types for the streamux engine.

use thiserror::Error;

/// Every failure the engine can report.
///
/// Encode-path operations never emit a partial frame before failing: all
/// validation happens before the first `on_message_data_encoded` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamuxError {
    /// The session configuration or `init` parameters are unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `init` was called on a session that already left the idle phase.
    #[error("Session already initialized")]
    AlreadyInitialized,

    /// Bytes were fed before `init` was called.
    #[error("Session not initialized")]
    NotInitialized,

    /// Stream traffic was attempted before the handshake completed.
    #[error("Session not negotiated")]
    NotNegotiated,

    /// A header field does not fit its negotiated bit width.
    #[error("{field} value {value} does not fit in {bits} bits")]
    FieldOverflow {
        field: &'static str,
        value: u32,
        bits: u8,
    },

    /// Data priority outside `[0, max_data_priority]`.
    #[error("Priority {0} is outside the data priority range")]
    InvalidPriority(u16),

    /// Every stream id is in use. Recoverable: retry once a stream completes.
    #[error("Stream id capacity exhausted")]
    CapacityExhausted,

    /// The id does not name an outstanding request of this side.
    #[error("Unknown stream id {0}")]
    UnknownStream(u32),

    /// The id is reserved for ping/pong.
    #[error("Stream id {0} is reserved")]
    ReservedId(u32),

    /// This side rejected the peer's Init Request.
    #[error("Negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The peer answered our Init Request with Init Reject.
    #[error("Peer rejected the session")]
    PeerRejected,

    /// The inbound byte stream broke the framing rules.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// The session is in a terminal phase.
    #[error("Session closed")]
    SessionClosed,
}

impl StreamuxError {
    /// True when the caller may retry the same operation later.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, StreamuxError::CapacityExhausted)
    }

    /// True when the error ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StreamuxError::NegotiationFailed(_)
                | StreamuxError::PeerRejected
                | StreamuxError::ProtocolViolation(_)
                | StreamuxError::SessionClosed
        )
    }
}

/// Result type alias using StreamuxError.
pub type Result<T> = std::result::Result<T, StreamuxError>;
