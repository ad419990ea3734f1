//! The protocol endpoint: handshake, outbound entry points and stream bookkeeping.
//!
//! A [`Session`] never touches a socket. Outbound frames are handed to the
//! [`Handler`] one complete frame at a time; inbound bytes are pushed in with
//! [`Session::decode_feed`] in whatever fragments the transport produced.

use std::collections::{HashMap, HashSet};

use bytes::BytesMut;
use tracing::{debug, trace};

use crate::config::{Role, SessionConfig};
use crate::decoder::{DecodeState, InboundStream};
use crate::encoder::ChunkEncoder;
use crate::error::{Result, StreamuxError};
use crate::handshake::{InitRequest, Negotiated};
use crate::header::{Direction, HeaderCodec, MAX_HEADER_LENGTH};
use crate::id_allocator::IdAllocator;

/// Caller-implemented callbacks.
pub trait Handler {
    /// One complete outbound frame. `payload` is `None` for header-only frames
    /// (handshake messages, control frames, empty messages).
    fn on_message_data_encoded(&mut self, priority: u16, header: &[u8], payload: Option<&[u8]>);

    /// Request bytes from the peer. `is_end` marks the last delivery of the request.
    fn on_request_data_decoded(&mut self, id: u32, data: &[u8], is_end: bool);

    /// Response bytes for one of our requests.
    fn on_response_data_decoded(&mut self, id: u32, data: &[u8], is_end: bool);

    /// The peer cancelled request `id`; stop producing its response.
    fn on_cancel_request(&mut self, id: u32);

    /// The peer answered one of our pings.
    fn on_pong(&mut self) {}
}

impl<H: Handler + ?Sized> Handler for &mut H {
    fn on_message_data_encoded(&mut self, priority: u16, header: &[u8], payload: Option<&[u8]>) {
        (**self).on_message_data_encoded(priority, header, payload)
    }

    fn on_request_data_decoded(&mut self, id: u32, data: &[u8], is_end: bool) {
        (**self).on_request_data_decoded(id, data, is_end)
    }

    fn on_response_data_decoded(&mut self, id: u32, data: &[u8], is_end: bool) {
        (**self).on_response_data_decoded(id, data, is_end)
    }

    fn on_cancel_request(&mut self, id: u32) {
        (**self).on_cancel_request(id)
    }

    fn on_pong(&mut self) {
        (**self).on_pong()
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, `init` not yet called.
    Idle,
    /// Responder waiting for the peer's Init Request.
    AwaitingInitRequest,
    /// Initiator waiting for Init Accept / Init Reject.
    AwaitingInitResponse,
    /// Stream traffic allowed.
    Negotiated,
    /// Negotiation failed on either side.
    Rejected,
    /// A protocol violation ended the session.
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Rejected | SessionPhase::Failed)
    }
}

/// One end of a multiplexed connection.
pub struct Session<H> {
    pub(crate) config: SessionConfig,
    pub(crate) handler: H,
    pub(crate) phase: SessionPhase,
    pub(crate) length_bits_capacity: u8,
    pub(crate) id_bits_capacity: u8,
    pub(crate) version: Option<u8>,
    pub(crate) encoder: Option<ChunkEncoder>,
    /// Ids of our outstanding requests.
    pub(crate) ids: IdAllocator,
    /// Our requests with a Cancel Request sent and no Cancel-Ack yet.
    pub(crate) cancelling: HashSet<u32>,
    /// Receive-side records for streams currently arriving.
    pub(crate) inbound: HashMap<(u32, Direction), InboundStream>,
    /// Peer requests fully received since their id last opened.
    pub(crate) completed_requests: HashSet<u32>,
    pub(crate) decode: DecodeState,
    /// Partial header or handshake message carried across feeds.
    pub(crate) pending: BytesMut,
}

impl<H> std::fmt::Debug for Session<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("role", &self.config.role)
            .field("phase", &self.phase)
            .field("version", &self.version)
            .field("outstanding_requests", &self.ids.in_use())
            .finish_non_exhaustive()
    }
}

impl<H: Handler> Session<H> {
    /// Create an idle session. Nothing is emitted until [`Session::init`].
    pub fn new(config: SessionConfig, handler: H) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            handler,
            phase: SessionPhase::Idle,
            length_bits_capacity: 0,
            id_bits_capacity: 0,
            version: None,
            encoder: None,
            ids: IdAllocator::new(0),
            cancelling: HashSet::new(),
            inbound: HashMap::new(),
            completed_requests: HashSet::new(),
            decode: DecodeState::Header,
            pending: BytesMut::with_capacity(MAX_HEADER_LENGTH + 1),
        })
    }

    /// Start the handshake.
    ///
    /// An initiator requests exactly these widths and emits its Init Request.
    /// A responder treats them as the widest fields it will accept and waits
    /// for the peer's request.
    pub fn init(&mut self, length_bits: u8, id_bits: u8) -> Result<()> {
        if self.phase != SessionPhase::Idle {
            return Err(StreamuxError::AlreadyInitialized);
        }
        if length_bits == 0 || id_bits == 0 {
            return Err(StreamuxError::InvalidConfig(format!(
                "bit widths must be non-zero (length {}, id {})",
                length_bits, id_bits
            )));
        }
        self.length_bits_capacity = length_bits;
        self.id_bits_capacity = id_bits;

        match self.config.role {
            Role::Initiator => {
                HeaderCodec::new(length_bits, id_bits)?;
                let request = InitRequest {
                    min_version: self.config.min_version,
                    max_version: self.config.max_version,
                    length_bits,
                    id_bits,
                    flags: 0,
                };
                self.handler
                    .on_message_data_encoded(self.config.control_priority, &request.encode(), None);
                self.phase = SessionPhase::AwaitingInitResponse;
                debug!(length_bits, id_bits, "sent init request");
            }
            Role::Responder => {
                self.phase = SessionPhase::AwaitingInitRequest;
                debug!(length_bits, id_bits, "awaiting init request");
            }
        }
        Ok(())
    }

    /// Submit a request. Returns the stream id it was assigned.
    ///
    /// `CapacityExhausted` means every id is in flight; retry after a
    /// response completes or a cancel is acknowledged.
    pub fn encode_request(&mut self, priority: u16, payload: &[u8]) -> Result<u32> {
        let encoder = self.negotiated_encoder()?;
        self.check_priority(priority)?;
        let id = self.ids.allocate()?;

        let handler = &mut self.handler;
        let sent = encoder.encode_message(priority, id, Direction::Request, payload, |p, header, data| {
            handler.on_message_data_encoded(p, header, data)
        });
        if let Err(err) = sent {
            self.ids.release(id);
            return Err(err);
        }
        trace!(id, len = payload.len(), "submitted request");
        Ok(id)
    }

    /// Submit the response to the peer's request `id`.
    pub fn encode_response(&mut self, priority: u16, id: u32, payload: &[u8]) -> Result<()> {
        let encoder = self.negotiated_encoder()?;
        self.check_priority(priority)?;
        if id == encoder.codec().max_id() {
            return Err(StreamuxError::ReservedId(id));
        }

        let handler = &mut self.handler;
        encoder.encode_message(priority, id, Direction::Response, payload, |p, header, data| {
            handler.on_message_data_encoded(p, header, data)
        })?;
        trace!(id, len = payload.len(), "submitted response");
        Ok(())
    }

    /// Cancel one of our outstanding requests.
    ///
    /// The id stays reserved until the peer's Cancel-Ack arrives. Cancelling a
    /// request that is already being cancelled does nothing.
    pub fn cancel_request(&mut self, id: u32) -> Result<()> {
        let encoder = self.negotiated_encoder()?;
        if !self.ids.is_allocated(id) {
            return Err(StreamuxError::UnknownStream(id));
        }
        if self.cancelling.contains(&id) {
            return Ok(());
        }

        self.send_control(&encoder, id, false, false)?;
        self.cancelling.insert(id);
        if let Some(record) = self.inbound.get_mut(&(id, Direction::Response)) {
            record.discarding = true;
        }
        if let DecodeState::Payload(ref mut payload) = self.decode {
            if payload.id == id && payload.direction == Direction::Response {
                payload.deliver = false;
            }
        }
        debug!(id, "cancelled request");
        Ok(())
    }

    /// Send a keep-alive probe; the peer answers with a pong.
    pub fn ping(&mut self) -> Result<()> {
        let encoder = self.negotiated_encoder()?;
        let ping_id = encoder.codec().max_id();
        self.send_control(&encoder, ping_id, false, true)?;
        trace!("sent ping");
        Ok(())
    }

    /// Drop all state and return to [`SessionPhase::Idle`].
    pub fn reset(&mut self) {
        self.phase = SessionPhase::Idle;
        self.length_bits_capacity = 0;
        self.id_bits_capacity = 0;
        self.version = None;
        self.encoder = None;
        self.ids = IdAllocator::new(0);
        self.cancelling.clear();
        self.inbound.clear();
        self.completed_requests.clear();
        self.decode = DecodeState::Header;
        self.pending.clear();
    }

    pub(crate) fn negotiated_encoder(&self) -> Result<ChunkEncoder> {
        match (self.phase, self.encoder) {
            (SessionPhase::Negotiated, Some(encoder)) => Ok(encoder),
            (phase, _) if phase.is_terminal() => Err(StreamuxError::SessionClosed),
            _ => Err(StreamuxError::NotNegotiated),
        }
    }

    fn check_priority(&self, priority: u16) -> Result<()> {
        if priority > self.config.max_data_priority {
            return Err(StreamuxError::InvalidPriority(priority));
        }
        Ok(())
    }

    /// Emit a zero-length control frame at control priority.
    pub(crate) fn send_control(
        &mut self,
        encoder: &ChunkEncoder,
        id: u32,
        is_response: bool,
        is_termination: bool,
    ) -> Result<()> {
        let header = encoder.encode_control(id, is_response, is_termination)?;
        self.handler
            .on_message_data_encoded(self.config.control_priority, header.as_bytes(), None);
        Ok(())
    }

    /// Adopt negotiated parameters and open the session for traffic.
    pub(crate) fn establish(&mut self, negotiated: Negotiated) {
        let encoder = ChunkEncoder::new(negotiated.codec, self.config.max_chunk_length);
        // The all-ones id is the ping id and is never allocated.
        self.ids = IdAllocator::new(negotiated.codec.max_id());
        self.encoder = Some(encoder);
        self.version = Some(negotiated.version);
        self.phase = SessionPhase::Negotiated;
        debug!(
            version = negotiated.version,
            length_bits = negotiated.codec.length_bits(),
            id_bits = negotiated.codec.id_bits(),
            max_chunk_length = encoder.max_chunk_length(),
            "session negotiated"
        );
    }
}

impl<H> Session<H> {
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_negotiated(&self) -> bool {
        self.phase == SessionPhase::Negotiated
    }

    /// Version agreed during the handshake.
    pub fn negotiated_version(&self) -> Option<u8> {
        self.version
    }

    /// Header codec for the negotiated widths.
    pub fn header_codec(&self) -> Option<&HeaderCodec> {
        self.encoder.as_ref().map(|e| e.codec())
    }

    /// Id reserved for ping/pong.
    pub fn ping_id(&self) -> Option<u32> {
        self.header_codec().map(|c| c.max_id())
    }

    /// Effective outbound chunk size.
    pub fn max_chunk_length(&self) -> Option<u32> {
        self.encoder.as_ref().map(|e| e.max_chunk_length())
    }

    /// Number of our requests whose ids are not yet released.
    pub fn outstanding_requests(&self) -> usize {
        self.ids.in_use()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }
}
