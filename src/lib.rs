//! streamux: a minimal, sans-I/O stream multiplexing protocol engine
//!
//! Two peers exchange many independent request/response streams over one
//! ordered byte transport. Each message is split into prioritized chunks,
//! tagged with a stream id, and reassembled on the other side. Streams can be
//! cancelled, and ping/pong keep the connection alive.
//!
//! # Features
//!
//! - **Sans-I/O Design**: the engine consumes bytes and emits frames through
//!   callbacks; you own the socket, the queue and the threads
//! - **Negotiated Headers**: id and length field widths are agreed in a
//!   handshake, so headers are as small as the deployment allows
//! - **Priority Hints**: every data chunk carries a priority in `[0, 65534]`;
//!   control frames use the reserved out-of-band priority `65535`
//! - **Fragment Tolerant**: input may be split at any byte
//! - **Cancellation & Keep-Alive**: cancel/cancel-ack and ping/pong ride the
//!   same framing as zero-length frames
//!
//! # Quick Start
//!
//! ```rust
//! use streamux::{Handler, Session, SessionConfig};
//!
//! #[derive(Default)]
//! struct Wire {
//!     out: Vec<u8>,
//! }
//!
//! impl Handler for Wire {
//!     fn on_message_data_encoded(&mut self, _priority: u16, header: &[u8], payload: Option<&[u8]>) {
//!         self.out.extend_from_slice(header);
//!         self.out.extend_from_slice(payload.unwrap_or_default());
//!     }
//!     fn on_request_data_decoded(&mut self, id: u32, data: &[u8], is_end: bool) {
//!         println!("request {}: {} bytes (end: {})", id, data.len(), is_end);
//!     }
//!     fn on_response_data_decoded(&mut self, id: u32, data: &[u8], is_end: bool) {
//!         println!("response {}: {} bytes (end: {})", id, data.len(), is_end);
//!     }
//!     fn on_cancel_request(&mut self, id: u32) {
//!         println!("request {} cancelled", id);
//!     }
//! }
//!
//! let mut client = Session::new(SessionConfig::initiator(), Wire::default()).unwrap();
//! let mut server = Session::new(SessionConfig::responder(), Wire::default()).unwrap();
//!
//! // Handshake
//! server.init(16, 8).unwrap();
//! client.init(16, 8).unwrap();
//! let hello = std::mem::take(&mut client.handler_mut().out);
//! server.decode_feed(&hello).unwrap();
//! let answer = std::mem::take(&mut server.handler_mut().out);
//! client.decode_feed(&answer).unwrap();
//! assert!(client.is_negotiated() && server.is_negotiated());
//!
//! // One request
//! let id = client.encode_request(10, b"hello").unwrap();
//! let bytes = std::mem::take(&mut client.handler_mut().out);
//! server.decode_feed(&bytes).unwrap();
//! server.encode_response(10, id, b"world").unwrap();
//! ```
//!
//! # Architecture
//!
//! - [`header`]: bit-packed header codec
//! - [`id_allocator`]: stream id allocation
//! - [`handshake`]: Init Request / Accept / Reject and negotiation
//! - [`encoder`]: chunking of outbound messages
//! - [`session`]: the endpoint tying it together, including the inbound
//!   decoding state machine
//!
//! It does NOT provide:
//! - Transport I/O (you move the bytes)
//! - Flow control beyond priority hints
//! - Encryption, authentication or delivery guarantees

pub mod config;
pub mod encoder;
pub mod error;
pub mod handshake;
pub mod header;
pub mod id_allocator;
pub mod session;

mod decoder;

pub use config::{priority, Role, SessionConfig, FLAG_BITS, MAX_HEADER_BITS, PROTOCOL_VERSION};
pub use encoder::ChunkEncoder;
pub use error::{Result, StreamuxError};
pub use handshake::{InitRequest, InitResponse};
pub use header::{bits_for, Direction, EncodedHeader, FrameHeader, HeaderCodec};
pub use id_allocator::IdAllocator;
pub use session::{Handler, Session, SessionPhase};

/// Library version (e.g. "1.0.0").
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
