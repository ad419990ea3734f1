//! Inbound decoding: handshake, then the header/payload state machine.
//!
//! Input may arrive split at any byte. Partial headers and handshake
//! messages are kept in the session's `pending` buffer; payload bytes are
//! delivered straight from the fed slice as soon as they arrive, so one
//! chunk can produce several deliveries.

use tracing::{debug, trace, warn};

use crate::encoder::ChunkEncoder;
use crate::error::{Result, StreamuxError};
use crate::handshake::{negotiate, InitRequest, InitResponse, Negotiated, INIT_REQUEST_LENGTH};
use crate::header::{Direction, FrameHeader, HeaderCodec};
use crate::session::{Handler, Session, SessionPhase};

/// Where the decoder is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeState {
    Header,
    Payload(PayloadState),
}

/// The chunk whose payload is being consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PayloadState {
    pub id: u32,
    pub direction: Direction,
    pub is_termination: bool,
    pub remaining: u32,
    /// False while discarding.
    pub deliver: bool,
}

/// Receiver-side record of a stream that has started arriving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InboundStream {
    pub discarding: bool,
}

impl<H: Handler> Session<H> {
    /// Feed bytes received from the transport.
    ///
    /// Any number of handler callbacks may fire before this returns. Bytes
    /// that complete the handshake and bytes of the first frames may share
    /// one feed. Negotiation failures and protocol violations end the
    /// session; afterwards every feed returns `SessionClosed`.
    pub fn decode_feed(&mut self, data: &[u8]) -> Result<()> {
        let mut input = data;
        loop {
            match self.phase {
                SessionPhase::Idle => return Err(StreamuxError::NotInitialized),
                SessionPhase::Rejected | SessionPhase::Failed => return Err(StreamuxError::SessionClosed),
                SessionPhase::AwaitingInitRequest => {
                    if !self.feed_init_request(&mut input)? {
                        return Ok(());
                    }
                }
                SessionPhase::AwaitingInitResponse => {
                    if !self.feed_init_response(&mut input)? {
                        return Ok(());
                    }
                }
                SessionPhase::Negotiated => {
                    let result = self.feed_frames(input);
                    if let Err(ref err) = result {
                        if err.is_fatal() {
                            warn!(error = %err, "decode failed, closing session");
                            self.fail(SessionPhase::Failed);
                        }
                    }
                    return result;
                }
            }
        }
    }

    /// Move bytes from `input` into `pending` until it holds `needed` bytes.
    fn fill_pending(&mut self, input: &mut &[u8], needed: usize) -> bool {
        let src: &[u8] = *input;
        let missing = needed.saturating_sub(self.pending.len());
        let take = missing.min(src.len());
        self.pending.extend_from_slice(&src[..take]);
        *input = &src[take..];
        self.pending.len() >= needed
    }

    fn fail(&mut self, phase: SessionPhase) {
        self.phase = phase;
        self.decode = DecodeState::Header;
        self.pending.clear();
    }

    /// Responder side. Returns true once the handshake is complete.
    fn feed_init_request(&mut self, input: &mut &[u8]) -> Result<bool> {
        if !self.fill_pending(input, INIT_REQUEST_LENGTH) {
            return Ok(false);
        }
        let Some(request) = InitRequest::decode(&self.pending) else {
            return Ok(false);
        };
        self.pending.clear();

        match negotiate(
            &self.config,
            self.length_bits_capacity,
            self.id_bits_capacity,
            &request,
        ) {
            Ok(negotiated) => {
                let accept = InitResponse::Accept {
                    version: negotiated.version,
                };
                self.handler
                    .on_message_data_encoded(self.config.control_priority, &accept.encode(), None);
                self.establish(negotiated);
                Ok(true)
            }
            Err(reason) => {
                warn!(%reason, ?request, "rejecting init request");
                self.handler.on_message_data_encoded(
                    self.config.control_priority,
                    &InitResponse::Reject.encode(),
                    None,
                );
                self.fail(SessionPhase::Rejected);
                Err(StreamuxError::NegotiationFailed(reason))
            }
        }
    }

    /// Initiator side. Returns true once the handshake is complete.
    fn feed_init_response(&mut self, input: &mut &[u8]) -> Result<bool> {
        if !self.fill_pending(input, 1) {
            return Ok(false);
        }
        let needed = match InitResponse::length_for(self.pending[0]) {
            Ok(needed) => needed,
            Err(err) => {
                self.fail(SessionPhase::Failed);
                return Err(err);
            }
        };
        if !self.fill_pending(input, needed) {
            return Ok(false);
        }
        let Some(response) = InitResponse::decode(&self.pending)? else {
            return Ok(false);
        };
        self.pending.clear();

        match response {
            InitResponse::Reject => {
                debug!("peer rejected init request");
                self.fail(SessionPhase::Rejected);
                Err(StreamuxError::PeerRejected)
            }
            InitResponse::Accept { version } => {
                if !self.config.supports_version(version) {
                    self.fail(SessionPhase::Failed);
                    return Err(StreamuxError::ProtocolViolation(format!(
                        "peer selected unsupported version {}",
                        version
                    )));
                }
                let codec = match HeaderCodec::new(self.length_bits_capacity, self.id_bits_capacity) {
                    Ok(codec) => codec,
                    Err(err) => {
                        self.fail(SessionPhase::Failed);
                        return Err(err);
                    }
                };
                self.establish(Negotiated { version, codec });
                Ok(true)
            }
        }
    }

    /// Negotiated phase: alternate between header and payload decoding.
    fn feed_frames(&mut self, mut input: &[u8]) -> Result<()> {
        let encoder = self.negotiated_encoder()?;
        let codec = *encoder.codec();

        while !input.is_empty() {
            match self.decode {
                DecodeState::Header => {
                    if !self.fill_pending(&mut input, codec.header_length()) {
                        break;
                    }
                    let Some(header) = codec.decode(&self.pending) else {
                        break;
                    };
                    self.pending.clear();
                    self.on_header(&encoder, header)?;
                }
                DecodeState::Payload(mut payload) => {
                    let take = (payload.remaining as usize).min(input.len());
                    let (piece, rest) = input.split_at(take);
                    input = rest;
                    payload.remaining -= take as u32;

                    let chunk_done = payload.remaining == 0;
                    let is_end = chunk_done && payload.is_termination;
                    self.decode = if chunk_done {
                        DecodeState::Header
                    } else {
                        DecodeState::Payload(payload)
                    };

                    if payload.deliver {
                        match payload.direction {
                            Direction::Request => self.handler.on_request_data_decoded(payload.id, piece, is_end),
                            Direction::Response => self.handler.on_response_data_decoded(payload.id, piece, is_end),
                        }
                    } else {
                        trace!(id = payload.id, len = piece.len(), "discarded payload");
                    }
                    if is_end {
                        self.finish_stream(payload.id, payload.direction);
                    }
                }
            }
        }
        Ok(())
    }

    fn on_header(&mut self, encoder: &ChunkEncoder, header: FrameHeader) -> Result<()> {
        trace!(
            id = header.id,
            len = header.payload_length,
            is_response = header.is_response,
            is_termination = header.is_termination,
            "decoded header"
        );
        if header.id == encoder.codec().max_id() {
            return self.on_keepalive(encoder, header);
        }
        if header.is_control() {
            return self.on_control(encoder, header);
        }

        let direction = header.direction();
        let deliver = !self.open_inbound(header.id, direction).discarding;
        self.decode = DecodeState::Payload(PayloadState {
            id: header.id,
            direction,
            is_termination: header.is_termination,
            remaining: header.payload_length,
            deliver,
        });
        Ok(())
    }

    /// Frames on the reserved ping id.
    fn on_keepalive(&mut self, encoder: &ChunkEncoder, header: FrameHeader) -> Result<()> {
        if !header.is_control() {
            return Err(StreamuxError::ProtocolViolation(format!(
                "{} byte payload on reserved ping id {}",
                header.payload_length, header.id
            )));
        }
        match (header.is_response, header.is_termination) {
            (false, true) => {
                trace!("ping received, sending pong");
                self.send_control(encoder, header.id, true, true)
            }
            (true, true) => {
                trace!("pong received");
                self.handler.on_pong();
                Ok(())
            }
            _ => Err(StreamuxError::ProtocolViolation(format!(
                "cancel frame on reserved ping id {}",
                header.id
            ))),
        }
    }

    /// Zero-length frames on application ids.
    fn on_control(&mut self, encoder: &ChunkEncoder, header: FrameHeader) -> Result<()> {
        let id = header.id;
        match (header.is_response, header.is_termination) {
            (false, false) => {
                self.handler.on_cancel_request(id);
                let key = (id, Direction::Request);
                if let Some(record) = self.inbound.get_mut(&key) {
                    record.discarding = true;
                    debug!(id, "peer cancelled request in progress");
                } else if self.completed_requests.remove(&id) {
                    debug!(id, "peer cancelled request");
                } else {
                    // The cancel overtook the request; swallow its chunks when they arrive.
                    warn!(id, "cancel for a request with no frames received");
                    self.inbound.insert(key, InboundStream { discarding: true });
                }
                self.send_control(encoder, id, true, false)
            }
            (false, true) => {
                if !self.open_inbound(id, Direction::Request).discarding {
                    self.handler.on_request_data_decoded(id, &[], true);
                }
                self.finish_stream(id, Direction::Request);
                Ok(())
            }
            (true, false) => {
                if self.cancelling.remove(&id) {
                    self.ids.release(id);
                    self.inbound.remove(&(id, Direction::Response));
                    debug!(id, "cancel acknowledged, id released");
                } else {
                    warn!(id, "cancel-ack for a stream that is not being cancelled");
                }
                Ok(())
            }
            (true, true) => {
                if !self.open_inbound(id, Direction::Response).discarding {
                    self.handler.on_response_data_decoded(id, &[], true);
                }
                self.finish_stream(id, Direction::Response);
                Ok(())
            }
        }
    }

    /// Record for a stream that is arriving, created on its first frame.
    ///
    /// Responses are discarded unless they answer one of our live,
    /// uncancelled requests.
    fn open_inbound(&mut self, id: u32, direction: Direction) -> &mut InboundStream {
        let key = (id, direction);
        if !self.inbound.contains_key(&key) {
            let discarding = match direction {
                Direction::Request => {
                    self.completed_requests.remove(&id);
                    false
                }
                Direction::Response => !self.ids.is_allocated(id) || self.cancelling.contains(&id),
            };
            self.inbound.insert(key, InboundStream { discarding });
        }
        self.inbound.entry(key).or_default()
    }

    /// Terminating chunk processed: drop the record and, for a completed
    /// response, return the id. Cancelled ids wait for their Cancel-Ack.
    fn finish_stream(&mut self, id: u32, direction: Direction) {
        let record = self.inbound.remove(&(id, direction));
        match direction {
            Direction::Request => {
                if record.is_some_and(|r| !r.discarding) {
                    self.completed_requests.insert(id);
                }
            }
            Direction::Response => {
                if !self.cancelling.contains(&id) && self.ids.release(id) {
                    trace!(id, "response complete, id released");
                }
            }
        }
    }
}
